//! Result types returned by a successful conversion.

use crate::pipeline::identifier::PaperId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything known about a finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub paper_id: PaperId,
    /// Title as shown on the abstract page, without the `[id]` prefix.
    pub title: String,
    /// File name of the `.tex` file that was compiled.
    pub main_document: String,
    /// Where the PDF was written (after `.pdf` normalisation).
    pub pdf_path: PathBuf,
    pub stats: ConversionStats,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Size of the downloaded source archive.
    pub archive_bytes: u64,
    /// Number of `.sty`/`.cls` files rewritten.
    pub style_files_rewritten: usize,
    /// Whether bibtex was run.
    pub bibliography_ran: bool,
    /// Compiler invocations (always 3 today).
    pub compile_passes: u32,
    pub fetch_duration_ms: u64,
    pub compile_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_output_has_no_scratch_path() {
        let out = ConversionOutput {
            paper_id: PaperId::parse("2301.00001").unwrap(),
            title: "A Paper".into(),
            main_document: "main.tex".into(),
            pdf_path: PathBuf::from("out/paper.pdf"),
            stats: ConversionStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["main_document", "paper_id", "pdf_path", "stats", "title"]
        );
        assert_eq!(json["pdf_path"], "out/paper.pdf");
    }
}
