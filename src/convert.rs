//! Conversion entry points.
//!
//! [`Converter`] does the expensive, fallible setup once (identifier parsing,
//! toolchain checks, HTTP client) so that a bad id or a missing `pdflatex`
//! is reported before anything touches the network or the filesystem.
//! [`convert`] and [`convert_sync`] wrap it for one-shot use.

use crate::config::{normalize_output_path, ConversionConfig};
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::compile::{CompilerDriver, Toolchain};
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::identifier::PaperId;
use crate::pipeline::{document, style};
use crate::progress::{ConversionProgressCallback, Stage};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// A prepared conversion of one paper.
///
/// ```rust,no_run
/// use arxiv_ereader::{ConversionConfig, Converter};
///
/// # tokio_test::block_on(async {
/// let converter = Converter::new("2301.00001v2", ConversionConfig::default()).await?;
/// let out = converter.convert("paper").await?;
/// assert_eq!(out.pdf_path.file_name().unwrap(), "paper.pdf");
/// # Ok::<(), arxiv_ereader::ConvertError>(())
/// # }).unwrap();
/// ```
pub struct Converter {
    paper_id: PaperId,
    config: ConversionConfig,
    toolchain: Toolchain,
    fetcher: Fetcher,
}

impl Converter {
    /// Validate `config`, parse `source` and check the external toolchain.
    ///
    /// # Errors
    /// * [`ConvertError::InvalidConfig`] for out-of-range page settings
    /// * [`ConvertError::InvalidIdentifier`] when `source` holds no paper id
    /// * [`ConvertError::MissingDependency`] when `pdflatex` (or, in
    ///   landscape mode, `pdftk`) is missing or broken
    pub async fn new(source: &str, config: ConversionConfig) -> Result<Self, ConvertError> {
        config.validate()?;
        let paper_id = PaperId::parse(source)?;
        debug!("Parsed paper id {}", paper_id);

        let toolchain = Toolchain::resolve(&config).await?;
        let fetcher = Fetcher::new(&config)?;

        Ok(Self {
            paper_id,
            config,
            toolchain,
            fetcher,
        })
    }

    pub fn paper_id(&self) -> &PaperId {
        &self.paper_id
    }

    /// Download, rewrite and compile the paper, writing the PDF to `output`.
    ///
    /// `output` gets a `.pdf` extension if it has none. The scratch directory
    /// is removed whether or not the conversion succeeds.
    pub async fn convert(
        &self,
        output: impl AsRef<Path>,
    ) -> Result<ConversionOutput, ConvertError> {
        let total_start = Instant::now();
        let output_path = normalize_output_path(output.as_ref());
        let geometry = self.config.geometry();
        let progress = self.config.progress_callback.as_deref();

        let work = self.create_work_dir()?;
        let work_dir = work.path().to_path_buf();
        debug!("Working directory: {}", work_dir.display());

        // ── Step 1: Title ────────────────────────────────────────────────
        let fetch_start = Instant::now();
        notify_stage(progress, Stage::FetchMetadata);
        let title = self.fetcher.fetch_title(&self.paper_id).await?;
        info!("Title: {}", title);

        // ── Step 2: Source archive ───────────────────────────────────────
        notify_stage(progress, Stage::Download);
        let archive = self
            .fetcher
            .fetch_source(&self.paper_id, &title, &work_dir, progress)
            .await?;
        let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

        // ── Step 3: Style files and main document ────────────────────────
        notify_stage(progress, Stage::Rewrite);
        let style_files = style::rewrite_style_files(&work_dir).await?;
        debug!("Rewrote {} style files", style_files);

        let main_tex = document::find_main_document(&work_dir).await?;
        document::rewrite_main_document(&main_tex, &geometry, self.config.landscape).await?;

        // ── Step 4: Compile ──────────────────────────────────────────────
        notify_stage(progress, Stage::Compile);
        let compile_start = Instant::now();
        let driver =
            CompilerDriver::new(&self.toolchain, self.config.show_compiler_output, progress);
        let report = driver.compile(&work_dir, &main_tex).await?;
        let compile_duration_ms = compile_start.elapsed().as_millis() as u64;

        // ── Step 5: Copy out ─────────────────────────────────────────────
        notify_stage(progress, Stage::Copy);
        copy_to_output(&report.pdf_path, &output_path).await?;

        work.close().map_err(|e| ConvertError::io(&work_dir, e))?;

        let stats = ConversionStats {
            archive_bytes: archive.bytes,
            style_files_rewritten: style_files,
            bibliography_ran: report.bibliography_ran,
            compile_passes: report.latex_passes,
            fetch_duration_ms,
            compile_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Converted {} in {}ms",
            self.paper_id, stats.total_duration_ms
        );

        if let Some(cb) = progress {
            cb.on_conversion_complete(&output_path);
        }

        Ok(ConversionOutput {
            paper_id: self.paper_id.clone(),
            title,
            main_document: main_tex
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
            pdf_path: output_path,
            stats,
        })
    }

    fn create_work_dir(&self) -> Result<tempfile::TempDir, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("arxiv-ereader_");
        match &self.config.temp_root {
            Some(root) => builder.tempdir_in(root).map_err(|e| ConvertError::io(root, e)),
            None => builder
                .tempdir()
                .map_err(|e| ConvertError::io(std::env::temp_dir(), e)),
        }
    }
}

/// Convert the paper named by `source` (an id or arxiv.org URL) and write
/// the PDF to `output`.
///
/// # Example
/// ```rust,no_run
/// use arxiv_ereader::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder().page_size(6.0, 8.0).build()?;
/// let out = convert("2301.00001", "paper.pdf", &config).await?;
/// println!("{} -> {}", out.title, out.pdf_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    source: impl AsRef<str>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    Converter::new(source.as_ref(), config.clone())
        .await?
        .convert(output)
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<str>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, output, config))
}

fn notify_stage(progress: Option<&dyn ConversionProgressCallback>, stage: Stage) {
    if let Some(cb) = progress {
        cb.on_stage_start(stage);
    }
}

/// Copy next to the destination, then rename, so a failed copy never leaves
/// a truncated PDF at `dest`.
async fn copy_to_output(pdf: &Path, dest: &Path) -> Result<(), ConvertError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConvertError::io(parent, e))?;
    }

    let tmp = partial_path(dest);
    tokio::fs::copy(pdf, &tmp)
        .await
        .map_err(|e| ConvertError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ConvertError::io(dest, e));
    }
    debug!("Copied {} to {}", pdf.display(), dest.display());
    Ok(())
}

/// `out/paper.pdf` → `out/paper.pdf.part`.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
