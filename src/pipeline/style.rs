//! Style-file pass: neutralise page geometry and two-column layout in the
//! `.sty`/`.cls` files shipped with the paper.
//!
//! Conference classes hard-code their page size and often refuse to run if
//! `geometry` is loaded. Every rule runs on every style file; rules that find
//! nothing to match leave the text unchanged.

use crate::error::ConvertError;
use crate::pipeline::{document, markup};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Apply every style-file rule, in order.
///
/// `\newgeometry` is handled before `\geometry` so the latter's pattern never
/// sees half of a `\newgeometry` call.
pub fn rewrite_style(input: &str) -> String {
    let out = markup::disable_geometry_package(input);
    let out = markup::disable_newgeometry(&out);
    let out = markup::disable_geometry_call(&out);
    let out = markup::disable_geometry_requirement(&out);
    let out = markup::force_one_column(&out);
    let out = markup::disable_geometry_guard(&out);
    markup::disable_geometry_package_error(&out)
}

/// `.sty` and `.cls` files at the top level of `dir`, sorted by name.
pub async fn find_style_files(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(dir, e))?
    {
        let path = entry.path();
        let is_style = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "sty" || ext == "cls");
        if is_style && document::is_file(&entry).await? {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Rewrite every style file in `dir` in place. Returns how many were found.
pub async fn rewrite_style_files(dir: &Path) -> Result<usize, ConvertError> {
    let files = find_style_files(dir).await?;

    for path in &files {
        debug!(
            "Processing: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::io(path, e))?;
        let rewritten = rewrite_style(&String::from_utf8_lossy(&bytes));
        tokio::fs::write(path, rewritten)
            .await
            .map_err(|e| ConvertError::io(path, e))?;
    }

    Ok(files.len())
}
