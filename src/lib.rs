//! # arxiv-ereader
//!
//! Recompile arXiv papers from their LaTeX source into PDFs sized for
//! e-readers.
//!
//! ## Why this crate?
//!
//! A journal PDF scaled down to a 6-inch screen is unreadable: two columns of
//! 9pt text shrink to a smudge. Reflowing the PDF loses equations and
//! figures. Instead this crate downloads the paper's source, strips the page
//! geometry and two-column layout out of the preamble and the bundled style
//! files, and lets `pdflatex` typeset the paper again for a small page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! id / URL
//!  │
//!  ├─ 1. Parse     extract YYMM.NNNNN[vN] from the input
//!  ├─ 2. Fetch     title from /abs/<id>, source tarball from /e-print/<id>
//!  ├─ 3. Style     neutralise geometry and \twocolumn in .sty/.cls files
//!  ├─ 4. Document  strip class options, inject page setup
//!  ├─ 5. Compile   pdflatex ×3 with bibtex after the first pass
//!  └─ 6. Output    copy the PDF out, remove the scratch directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv_ereader::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 4×6 inch page with 0.2 inch margins
//!     let config = ConversionConfig::default();
//!     let output = convert("https://arxiv.org/abs/1706.03762", "attention.pdf", &config).await?;
//!     eprintln!("{} -> {}", output.title, output.pdf_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Builds the `arxiv2ereader` binary (clap, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arxiv-ereader = { version = "0.1", default-features = false }
//! ```
//!
//! ## External programs
//!
//! `pdflatex` must be on `PATH` (override with
//! [`ConversionConfigBuilder::latex_bin`]); `bibtex` is needed for papers
//! with a bibliography. Landscape mode also requires `pdftk`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    normalize_output_path, ConversionConfig, ConversionConfigBuilder, GeometrySettings,
};
pub use convert::{convert, convert_sync, Converter};
pub use error::ConvertError;
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::identifier::PaperId;
pub use progress::{
    CompileStep, ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage,
};
