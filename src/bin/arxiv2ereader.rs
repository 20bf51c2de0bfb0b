//! CLI binary for arxiv-ereader.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports the result.

use anyhow::{Context, Result};
use arxiv_ereader::{
    CompileStep, ConversionConfig, ConversionProgressCallback, ConvertError, Converter,
    ProgressCallback, Stage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that shows the current stage, download size and
/// compiler pass.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        let msg = match total {
            Some(t) => format!("{} / {}", human_bytes(downloaded), human_bytes(t)),
            None => human_bytes(downloaded),
        };
        self.bar.set_message(msg);
    }

    fn on_compile_pass(&self, step: CompileStep) {
        self.bar.set_message(step.to_string());
    }

    fn on_conversion_complete(&self, output: &Path) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} PDF saved to {}",
            green("✔"),
            bold(&output.display().to_string())
        );
    }
}

fn human_bytes(n: u64) -> String {
    const KIB: f64 = 1024.0;
    let n = n as f64;
    if n < KIB {
        format!("{n} B")
    } else if n < KIB * KIB {
        format!("{:.1} KiB", n / KIB)
    } else {
        format!("{:.1} MiB", n / (KIB * KIB))
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Kindle-sized PDF (4x6 inches, 0.2 inch margins)
  arxiv2ereader -u https://arxiv.org/abs/1706.03762 -o attention

  # Bare id, larger page
  arxiv2ereader -u 2301.00001 -o paper.pdf -W 6 -H 8

  # Landscape, narrow margins
  arxiv2ereader -u 2301.00001v2 -o paper -l -m 0.1

  # Show the pdflatex output
  arxiv2ereader -u 2301.00001 -o paper -v

REQUIREMENTS:
  pdflatex   TeX Live or MiKTeX (always)
  bibtex     papers with a bibliography
  pdftk      landscape mode only

ENVIRONMENT VARIABLES:
  ARXIV_BASE_URL   Override the repository base URL
  RUST_LOG         Override the log filter (e.g. arxiv_ereader=debug)
"#;

/// Convert arXiv papers into PDFs sized for e-readers.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv2ereader",
    version,
    about = "Convert arXiv papers into PDFs sized for e-readers",
    long_about = "Download an arXiv paper's LaTeX source, strip its page geometry and \
two-column layout, and recompile it with pdflatex for a small e-reader page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv paper URL or id (e.g. 2301.00001).
    #[arg(short, long, env = "ARXIV_EREADER_URL")]
    url: String,

    /// Output PDF path; `.pdf` is appended when there is no extension.
    #[arg(short, long, env = "ARXIV_EREADER_OUTPUT")]
    output: PathBuf,

    /// Page width in inches.
    #[arg(short = 'W', long, env = "ARXIV_EREADER_WIDTH", default_value_t = 4.0)]
    width: f64,

    /// Page height in inches.
    #[arg(short = 'H', long, env = "ARXIV_EREADER_HEIGHT", default_value_t = 6.0)]
    height: f64,

    /// Margin in inches, strictly between 0 and 1.
    #[arg(short, long, env = "ARXIV_EREADER_MARGIN", default_value_t = 0.2,
          value_parser = parse_margin)]
    margin: f64,

    /// Landscape mode (swaps width and height).
    #[arg(short, long, env = "ARXIV_EREADER_LANDSCAPE")]
    landscape: bool,

    /// Enable DEBUG-level logs and show compiler output.
    #[arg(short, long, env = "ARXIV_EREADER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARXIV_EREADER_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ARXIV_EREADER_NO_PROGRESS")]
    no_progress: bool,

    /// Print the conversion result as JSON on stdout.
    #[arg(long, env = "ARXIV_EREADER_JSON")]
    json: bool,

    /// LaTeX compiler binary.
    #[arg(long, env = "ARXIV_EREADER_LATEX", default_value = "pdflatex")]
    latex: String,

    /// Bibliography processor binary.
    #[arg(long, env = "ARXIV_EREADER_BIBTEX", default_value = "bibtex")]
    bibtex: String,

    /// PDF tool required in landscape mode.
    #[arg(long, env = "ARXIV_EREADER_PDF_TOOL", default_value = "pdftk")]
    pdf_tool: String,

    /// Repository base URL.
    #[arg(long, env = "ARXIV_BASE_URL", default_value = arxiv_ereader::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// HTTP timeout in seconds (no timeout when unset).
    #[arg(long, env = "ARXIV_EREADER_DOWNLOAD_TIMEOUT")]
    download_timeout: Option<u64>,
}

/// Margins must leave room for text on a small page.
fn parse_margin(s: &str) -> std::result::Result<f64, String> {
    let margin: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if margin > 0.0 && margin < 1.0 {
        Ok(margin)
    } else {
        Err(format!("Margin must be between 0 and 1, got {margin}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level milestones when it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .without_time()
            .with_target(false)
            .init();
    }

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);

    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => fail(e, spinner.as_deref())?,
    };

    // ── Run conversion ───────────────────────────────────────────────────
    let converter = match Converter::new(&cli.url, config).await {
        Ok(c) => c,
        Err(e) => fail(e, spinner.as_deref())?,
    };
    let output = match converter.convert(&cli.output).await {
        Ok(out) => out,
        Err(e) => fail(e, spinner.as_deref())?,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    info!("Conversion complete! PDF saved to: {}", output.pdf_path.display());
    info!("You can now send this file to your e-reader.");
    if show_progress {
        eprintln!(
            "   {}",
            dim(&format!(
                "{}  ·  {}ms  ·  send it to your e-reader",
                output.title, output.stats.total_duration_ms
            ))
        );
    }

    Ok(())
}

/// Report a failed conversion.
///
/// Expected failures (bad input, missing tools, uncompilable source) are one
/// log line and exit status 1. Anything else is returned to `main` so anyhow
/// prints the full cause chain.
fn fail<T>(e: ConvertError, spinner: Option<&CliProgressCallback>) -> Result<T> {
    if let Some(s) = spinner {
        s.abandon();
    }
    if e.is_expected() {
        error!("{e}");
        std::process::exit(1);
    }
    Err(e).context("Conversion failed")
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig, ConvertError> {
    let mut builder = ConversionConfig::builder()
        .page_size(cli.width, cli.height)
        .margin(cli.margin)
        .landscape(cli.landscape)
        .show_compiler_output(cli.verbose)
        .base_url(cli.base_url.clone())
        .latex_bin(cli.latex.clone())
        .bibtex_bin(cli.bibtex.clone())
        .pdf_tool_bin(cli.pdf_tool.clone());

    if let Some(secs) = cli.download_timeout {
        builder = builder.download_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build()
}
