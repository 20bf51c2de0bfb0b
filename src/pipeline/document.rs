//! Main-document pass: find the `.tex` file that declares the document class
//! and rewrite it for the target page.
//!
//! ## Steps
//!
//! 1. Drop comment and blank lines.
//! 2. Strip size/column/paper options from `\documentclass`, add `onecolumn`.
//! 3. Comment out `\newgeometry`, turn `\twocolumn` into `\onecolumn`.
//! 4. Inject page setup right before `\begin{document}`.
//! 5. Scale `\includegraphics` by both page width and height.
//!
//! Dropping comments loses their text, but it guarantees line 0 is the
//! `\documentclass` line and keeps commented-out `\begin{document}` markers
//! from being counted.

use crate::config::GeometrySettings;
use crate::error::ConvertError;
use crate::pipeline::markup;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BEGIN_DOCUMENT: &str = "\\begin{document}";

/// The conditional load keeps a class that already pulled in `geometry`
/// from hitting an "option clash" error.
const LOAD_GEOMETRY_IF_MISSING: &str =
    "\\makeatletter\\@ifpackageloaded{geometry}{}{\\usepackage{geometry}}\\makeatother";

/// Rewrite the main document's text.
///
/// `path` is only used for error messages.
pub fn rewrite_document(
    source: &str,
    geometry: &GeometrySettings,
    landscape: bool,
    path: &Path,
) -> Result<String, ConvertError> {
    let mut lines: Vec<String> = source
        .lines()
        .filter(|line| !is_comment_or_blank(line))
        .map(str::to_string)
        .collect();

    if let Some(first) = lines.first_mut() {
        *first = markup::ensure_onecolumn_option(&markup::strip_class_options(first));
    }

    for line in lines.iter_mut() {
        let out = markup::disable_newgeometry_in_line(line);
        *line = markup::force_one_column(&out);
    }

    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_start().starts_with(BEGIN_DOCUMENT))
        .map(|(i, _)| i)
        .collect();
    let begin = match markers.as_slice() {
        [only] => *only,
        _ => {
            return Err(ConvertError::StructureError {
                path: path.to_path_buf(),
                found: markers.len(),
            })
        }
    };

    let setup = page_setup_lines(geometry, landscape);
    debug!("Applying geometry: {}", geometry.directive());
    lines.splice(begin..begin, setup);

    for line in lines.iter_mut() {
        *line = markup::fit_images_to_page(line);
    }

    Ok(lines.join("\n"))
}

/// Lines injected before `\begin{document}`, in order.
pub fn page_setup_lines(geometry: &GeometrySettings, landscape: bool) -> Vec<String> {
    let mut setup = Vec::with_capacity(5);
    if landscape {
        setup.push("\\usepackage{pdflscape}".to_string());
    }
    setup.push("\\usepackage{times}".to_string());
    setup.push("\\pagestyle{empty}".to_string());
    setup.push(LOAD_GEOMETRY_IF_MISSING.to_string());
    setup.push(geometry.directive());
    setup
}

/// Blank, or a `%` comment once leading whitespace is ignored.
fn is_comment_or_blank(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('%')
}

/// `true` when the first non-blank, non-comment line declares a class.
fn declares_document_class(source: &str) -> bool {
    source
        .lines()
        .find(|line| !is_comment_or_blank(line))
        .is_some_and(|line| line.contains("documentclass"))
}

/// Pick the main `.tex` file at the top level of `dir`.
///
/// Candidates are tried in name order; the first that declares a document
/// class wins.
pub async fn find_main_document(dir: &Path) -> Result<PathBuf, ConvertError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::io(dir, e))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tex") && is_file(&entry).await? {
            candidates.push(path);
        }
    }
    candidates.sort();

    for path in candidates {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ConvertError::io(&path, e))?;
        if declares_document_class(&String::from_utf8_lossy(&bytes)) {
            return Ok(path);
        }
    }

    Err(ConvertError::MainDocumentNotFound {
        dir: dir.to_path_buf(),
    })
}

pub(crate) async fn is_file(entry: &tokio::fs::DirEntry) -> Result<bool, ConvertError> {
    let path = entry.path();
    match tokio::fs::metadata(&path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConvertError::io(&path, e)),
    }
}

/// `main.tex` → `main.tex.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Back up the main document and overwrite it with the rewritten text.
pub async fn rewrite_main_document(
    path: &Path,
    geometry: &GeometrySettings,
    landscape: bool,
) -> Result<(), ConvertError> {
    info!(
        "Processing: {}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ConvertError::io(path, e))?;
    let rewritten = rewrite_document(&String::from_utf8_lossy(&bytes), geometry, landscape, path)?;

    let backup = backup_path(path);
    tokio::fs::copy(path, &backup)
        .await
        .map_err(|e| ConvertError::io(&backup, e))?;
    tokio::fs::write(path, rewritten)
        .await
        .map_err(|e| ConvertError::io(path, e))?;
    Ok(())
}
