//! Error types for the arxiv-ereader library.
//!
//! A conversion is all-or-nothing: there is no partial PDF worth keeping, so
//! every failure is a single [`ConvertError`] returned from the top-level
//! entry points. The scratch directory is discarded on every error path.
//!
//! Variants fall into two groups, distinguished by
//! [`ConvertError::is_expected`]:
//!
//! * **Expected** failures are caused by the user's input or environment
//!   (malformed id, missing `pdflatex`, a paper whose source cannot be
//!   compiled). The CLI reports them as one line and exits with status 1.
//! * Everything else (transport errors, corrupt archives, I/O) is surfaced
//!   with its full cause chain.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the arxiv-ereader library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input is neither a paper id nor a URL containing one.
    #[error(
        "Invalid arXiv URL or ID: {input:?}\n\
Expected format: YYMM.NNNNN (e.g., 2301.00001) or a full arxiv.org URL"
    )]
    InvalidIdentifier { input: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Environment errors ────────────────────────────────────────────────
    /// A required external program is missing or does not run.
    #[error("{binary} not found - {hint}")]
    MissingDependency { binary: String, hint: String },

    // ── Network errors ────────────────────────────────────────────────────
    /// The request failed or the server answered with a non-success status.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    Network { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    NetworkTimeout { url: String, secs: u64 },

    /// The abstract page carried no usable `<title>`.
    #[error("Could not extract title from {url}")]
    TitleNotFound { url: String },

    // ── Source errors ─────────────────────────────────────────────────────
    /// The downloaded source archive is not a readable gzipped tarball.
    #[error("Source archive '{path}' could not be extracted: {detail}")]
    Archive { path: PathBuf, detail: String },

    /// No `.tex` file in the source starts with a `\documentclass` line.
    #[error("No main .tex file found (no \\documentclass) in '{dir}'")]
    MainDocumentNotFound { dir: PathBuf },

    /// The main document does not contain exactly one `\begin{document}`.
    #[error("Expected 1 \\begin{{document}} in '{path}', found {found}")]
    StructureError { path: PathBuf, found: usize },

    /// The compiler ran but did not leave a PDF behind.
    #[error("PDF was not generated: '{path}'\nRe-run with --verbose to see the LaTeX output.")]
    ArtifactMissing { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Build an [`ConvertError::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for failures caused by user input or the local environment.
    ///
    /// These are reported as a single line; anything else is treated as a
    /// bug or an infrastructure problem and reported with its cause chain.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidIdentifier { .. }
                | ConvertError::InvalidConfig(_)
                | ConvertError::MissingDependency { .. }
                | ConvertError::TitleNotFound { .. }
                | ConvertError::MainDocumentNotFound { .. }
                | ConvertError::StructureError { .. }
                | ConvertError::ArtifactMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_identifier_display_quotes_input() {
        let e = ConvertError::InvalidIdentifier {
            input: "abc".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("\"abc\""), "got: {msg}");
        assert!(msg.contains("YYMM.NNNNN"));
    }

    #[test]
    fn structure_error_display() {
        let e = ConvertError::StructureError {
            path: PathBuf::from("main.tex"),
            found: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("\\begin{document}"), "got: {msg}");
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn missing_dependency_display() {
        let e = ConvertError::MissingDependency {
            binary: "pdflatex".into(),
            hint: "please install TeX Live".into(),
        };
        assert_eq!(e.to_string(), "pdflatex not found - please install TeX Live");
    }

    #[test]
    fn expected_errors_are_user_facing() {
        assert!(ConvertError::InvalidIdentifier { input: "x".into() }.is_expected());
        assert!(ConvertError::ArtifactMissing {
            path: PathBuf::from("a.pdf")
        }
        .is_expected());
        assert!(!ConvertError::Network {
            url: "https://arxiv.org/abs/2301.00001".into(),
            reason: "HTTP 503".into(),
        }
        .is_expected());
        assert!(!ConvertError::Archive {
            path: PathBuf::from("a.tar.gz"),
            detail: "invalid gzip header".into(),
        }
        .is_expected());
    }
}
