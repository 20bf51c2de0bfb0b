//! Progress-callback trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to be told
//! when each pipeline stage starts, how far the source download has got, and
//! which compiler pass is running.
//!
//! # Example
//!
//! ```rust
//! use arxiv_ereader::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog {
//!     seen: Mutex<Vec<Stage>>,
//! }
//!
//! impl ConversionProgressCallback for StageLog {
//!     fn on_stage_start(&self, stage: Stage) {
//!         self.seen.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog { seen: Mutex::new(Vec::new()) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(log as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Pipeline stages in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Fetching the abstract page for the title.
    FetchMetadata,
    /// Streaming the source archive.
    Download,
    /// Unpacking the archive into the scratch directory.
    Extract,
    /// Rewriting style files and the main document.
    Rewrite,
    /// Running the compiler and bibtex.
    Compile,
    /// Copying the PDF to its destination.
    Copy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::FetchMetadata => "Fetching metadata",
            Stage::Download => "Downloading source",
            Stage::Extract => "Extracting",
            Stage::Rewrite => "Rewriting markup",
            Stage::Compile => "Compiling",
            Stage::Copy => "Saving PDF",
        };
        f.write_str(s)
    }
}

/// One external program invocation inside the compile stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileStep {
    /// Compiler pass `n` of `total` (1-indexed).
    Latex { pass: u32, total: u32 },
    /// The bibliography processor.
    Bibtex,
}

impl fmt::Display for CompileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStep::Latex { pass, total } => write!(f, "pass {pass}/{total}"),
            CompileStep::Bibtex => f.write_str("bibtex"),
        }
    }
}

/// Called by the conversion pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages are strictly sequential, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when `stage` begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after every chunk of the source archive is written.
    ///
    /// `total` is the `Content-Length`, when the server sent one.
    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        let _ = (downloaded, total);
    }

    /// Called before each compiler or bibtex invocation.
    fn on_compile_pass(&self, step: CompileStep) {
        let _ = step;
    }

    /// Called once the PDF is at `output`.
    fn on_conversion_complete(&self, output: &Path) {
        let _ = output;
    }
}

/// A no-op implementation of [`ConversionProgressCallback`].
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for a shared, heap-allocated progress callback.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
