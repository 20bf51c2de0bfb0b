//! Configuration types for paper conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The page geometry the LaTeX source is
//! forced into is derived from it as [`GeometrySettings`].

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default repository the paper source is fetched from.
pub const DEFAULT_BASE_URL: &str = "https://arxiv.org";

/// Configuration for a paper conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use arxiv_ereader::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .page_size(6.0, 8.0)
///     .margin(0.3)
///     .landscape(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry().paper_width, 8.0);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Page width in inches. Default: 4.
    pub page_width: f64,

    /// Page height in inches. Default: 6.
    ///
    /// 4 × 6 in matches the usable area of a 6" e-ink screen.
    pub page_height: f64,

    /// Page margin in inches, strictly between 0 and 1. Default: 0.2.
    pub margin: f64,

    /// Swap width and height and load `pdflscape`. Default: false.
    ///
    /// Requires the PDF tool (`pdf_tool_bin`) to be installed.
    pub landscape: bool,

    /// Let the compiler and bibtex write to the terminal instead of
    /// discarding their output. Default: false.
    pub show_compiler_output: bool,

    /// Repository base URL; `/abs/<id>` and `/e-print/<id>` are appended.
    pub base_url: String,

    /// Typesetting compiler. Default: `pdflatex`.
    pub latex_bin: String,

    /// Bibliography processor. Default: `bibtex`.
    pub bibtex_bin: String,

    /// PDF manipulation tool checked for in landscape mode. Default: `pdftk`.
    pub pdf_tool_bin: String,

    /// HTTP request timeout in seconds. Default: None (wait indefinitely).
    pub download_timeout_secs: Option<u64>,

    /// Directory under which the scratch directory is created.
    /// Default: None (system temp dir).
    pub temp_root: Option<PathBuf>,

    /// Stage events for progress display.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_width: 4.0,
            page_height: 6.0,
            margin: 0.2,
            landscape: false,
            show_compiler_output: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            latex_bin: "pdflatex".to_string(),
            bibtex_bin: "bibtex".to_string(),
            pdf_tool_bin: "pdftk".to_string(),
            download_timeout_secs: None,
            temp_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_width", &self.page_width)
            .field("page_height", &self.page_height)
            .field("margin", &self.margin)
            .field("landscape", &self.landscape)
            .field("show_compiler_output", &self.show_compiler_output)
            .field("base_url", &self.base_url)
            .field("latex_bin", &self.latex_bin)
            .field("bibtex_bin", &self.bibtex_bin)
            .field("pdf_tool_bin", &self.pdf_tool_bin)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("temp_root", &self.temp_root)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the invariants `build()` enforces.
    ///
    /// Fields are public, so the converter re-checks before doing any work.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(self.margin > 0.0 && self.margin < 1.0) {
            return Err(ConvertError::InvalidConfig(format!(
                "Margin must be between 0 and 1, got {}",
                self.margin
            )));
        }
        for (name, value) in [("width", self.page_width), ("height", self.page_height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConvertError::InvalidConfig(format!(
                    "Page {name} must be a positive number of inches, got {value}"
                )));
            }
        }
        if self.base_url.trim().is_empty() {
            return Err(ConvertError::InvalidConfig("Base URL is empty".into()));
        }
        Ok(())
    }

    /// Geometry for this config, with width and height swapped in landscape.
    pub fn geometry(&self) -> GeometrySettings {
        GeometrySettings::new(self.page_width, self.page_height, self.margin, self.landscape)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_size(mut self, width: f64, height: f64) -> Self {
        self.config.page_width = width;
        self.config.page_height = height;
        self
    }

    pub fn margin(mut self, margin: f64) -> Self {
        self.config.margin = margin;
        self
    }

    pub fn landscape(mut self, v: bool) -> Self {
        self.config.landscape = v;
        self
    }

    pub fn show_compiler_output(mut self, v: bool) -> Self {
        self.config.show_compiler_output = v;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn latex_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.latex_bin = bin.into();
        self
    }

    pub fn bibtex_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.bibtex_bin = bin.into();
        self
    }

    pub fn pdf_tool_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.pdf_tool_bin = bin.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = Some(secs);
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Physical page layout injected into the main document, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySettings {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin: f64,
}

impl GeometrySettings {
    /// Landscape swaps the two page dimensions; nothing else changes.
    pub fn new(width: f64, height: f64, margin: f64, landscape: bool) -> Self {
        let (paper_width, paper_height) = if landscape {
            (height, width)
        } else {
            (width, height)
        };
        Self {
            paper_width,
            paper_height,
            margin,
        }
    }

    /// `key=value` pairs in the order they appear in the directive.
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            ("paperwidth", format!("{}in", self.paper_width)),
            ("paperheight", format!("{}in", self.paper_height)),
            ("margin", format!("{}in", self.margin)),
        ]
    }

    /// The `\geometry{...}` line inserted before `\begin{document}`.
    pub fn directive(&self) -> String {
        let settings = self
            .pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("\\geometry{{{settings}}}")
    }
}

/// Append `.pdf` to an output path that has no extension.
pub fn normalize_output_path(path: &Path) -> PathBuf {
    if path.extension().is_none() {
        path.with_extension("pdf")
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_six_inch_reader() {
        let c = ConversionConfig::default();
        assert_eq!((c.page_width, c.page_height, c.margin), (4.0, 6.0, 0.2));
        assert_eq!(c.latex_bin, "pdflatex");
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert!(c.download_timeout_secs.is_none());
    }

    #[test]
    fn margin_must_be_strictly_inside_unit_interval() {
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let err = ConversionConfig::builder().margin(bad).build().unwrap_err();
            assert!(
                matches!(err, ConvertError::InvalidConfig(_)),
                "margin {bad} should be rejected"
            );
        }
        assert!(ConversionConfig::builder().margin(0.5).build().is_ok());
    }

    #[test]
    fn page_size_must_be_positive() {
        assert!(ConversionConfig::builder().page_size(0.0, 6.0).build().is_err());
        assert!(ConversionConfig::builder()
            .page_size(4.0, f64::INFINITY)
            .build()
            .is_err());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = ConversionConfig::builder()
            .base_url("http://127.0.0.1:8080/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn geometry_directive_default() {
        let g = ConversionConfig::default().geometry();
        assert_eq!(
            g.directive(),
            "\\geometry{paperwidth=4in,paperheight=6in,margin=0.2in}"
        );
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let g = GeometrySettings::new(4.0, 6.0, 0.2, true);
        assert_eq!(g.paper_width, 6.0);
        assert_eq!(g.paper_height, 4.0);
        assert!(g.directive().starts_with("\\geometry{paperwidth=6in,paperheight=4in"));
    }

    #[test]
    fn fractional_inches_keep_decimals() {
        let g = GeometrySettings::new(3.5, 4.75, 0.25, false);
        assert_eq!(
            g.directive(),
            "\\geometry{paperwidth=3.5in,paperheight=4.75in,margin=0.25in}"
        );
    }

    #[test]
    fn output_path_gets_pdf_extension() {
        assert_eq!(
            normalize_output_path(Path::new("paper")),
            PathBuf::from("paper.pdf")
        );
        assert_eq!(
            normalize_output_path(Path::new("out/paper")),
            PathBuf::from("out/paper.pdf")
        );
        assert_eq!(
            normalize_output_path(Path::new("paper.pdf")),
            PathBuf::from("paper.pdf")
        );
        assert_eq!(
            normalize_output_path(Path::new("paper.kindle")),
            PathBuf::from("paper.kindle")
        );
    }
}
