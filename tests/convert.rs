//! Integration tests for the full conversion pipeline.
//!
//! The repository is a throwaway HTTP server on `127.0.0.1:0` and the TeX
//! toolchain is replaced by shell scripts, so these run offline and without
//! a TeX installation. The fake compiler copies the `.tex` it is given to
//! `<stem>.pdf`, which lets the tests inspect the rewritten source.

#![cfg(unix)]

use arxiv_ereader::{
    convert, ConversionConfig, ConversionProgressCallback, ConvertError, Converter, Stage,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const ID: &str = "2301.00001";

const MAIN_TEX: &str = r"\documentclass[10pt,twocolumn,letterpaper]{article}
\usepackage{confstyle}
\usepackage{graphicx}
\begin{document}
\twocolumn[\maketitle]
\includegraphics[width=0.5\linewidth]{fig.png}
\end{document}
";

const STYLE: &str = r"\ProvidesPackage{confstyle}
\RequirePackage[margin=1in]{geometry}
";

// ── Test helpers ─────────────────────────────────────────────────────────────

type Routes = HashMap<String, (u16, Vec<u8>)>;

/// Serve `routes` until the test's runtime shuts down. Returns the base URL.
async fn serve(routes: Routes) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = sock.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .get(&path)
                    .cloned()
                    .unwrap_or((404, b"not found".to_vec()));
                let reason = if status == 200 { "OK" } else { "Not Found" };
                let head = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = sock.write_all(head.as_bytes()).await;
                let _ = sock.write_all(&body).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn paper_routes(files: &[(&str, &str)]) -> Routes {
    let mut routes = Routes::new();
    routes.insert(
        format!("/abs/{ID}"),
        (
            200,
            format!("<html><head><title>[{ID}] A Tiny   Paper</title></head></html>").into_bytes(),
        ),
    );
    routes.insert(format!("/e-print/{ID}"), (200, tarball(files)));
    routes
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Fake `pdflatex` and `bibtex` in `dir`.
fn fake_toolchain(dir: &Path) -> (PathBuf, PathBuf) {
    let latex = script(
        dir,
        "pdflatex",
        "[ \"$1\" = \"--version\" ] && exit 0\n\
         for a in \"$@\"; do f=\"$a\"; done\n\
         cp \"$f\" \"${f%.tex}.pdf\"",
    );
    let bibtex = script(dir, "bibtex", "exit 0");
    (latex, bibtex)
}

struct Fixture {
    _bin: tempfile::TempDir,
    scratch: tempfile::TempDir,
    out: tempfile::TempDir,
    config: ConversionConfig,
}

async fn fixture(routes: Routes) -> Fixture {
    let base_url = serve(routes).await;
    let bin = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let (latex, bibtex) = fake_toolchain(bin.path());

    let config = ConversionConfig::builder()
        .base_url(base_url)
        .latex_bin(latex.to_string_lossy())
        .bibtex_bin(bibtex.to_string_lossy())
        .temp_root(scratch.path())
        .build()
        .unwrap();

    Fixture {
        _bin: bin,
        scratch,
        out,
        config,
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[derive(Default)]
struct StageLog {
    stages: Mutex<Vec<Stage>>,
    completed: Mutex<Option<PathBuf>>,
}

impl ConversionProgressCallback for StageLog {
    fn on_stage_start(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_conversion_complete(&self, output: &Path) {
        *self.completed.lock().unwrap() = Some(output.to_path_buf());
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn converts_paper_end_to_end() {
    let mut fx = fixture(paper_routes(&[("main.tex", MAIN_TEX), ("confstyle.sty", STYLE)])).await;
    let log = Arc::new(StageLog::default());
    fx.config.progress_callback = Some(log.clone());

    let output_arg = fx.out.path().join("kindle/paper");
    let converter = Converter::new(&format!("https://arxiv.org/abs/{ID}"), fx.config.clone())
        .await
        .unwrap();
    assert_eq!(converter.paper_id().as_str(), ID);

    let output = converter.convert(&output_arg).await.unwrap();

    let pdf = fx.out.path().join("kindle/paper.pdf");
    assert_eq!(output.pdf_path, pdf);
    assert_eq!(output.title, "A Tiny Paper");
    assert_eq!(output.main_document, "main.tex");
    assert_eq!(output.stats.style_files_rewritten, 1);
    assert_eq!(output.stats.compile_passes, 3);
    assert!(!output.stats.bibliography_ran);
    assert!(output.stats.archive_bytes > 0);

    // The fake compiler copied the rewritten source into the "PDF".
    let rewritten = std::fs::read_to_string(&pdf).unwrap();
    assert!(rewritten.starts_with("\\documentclass[onecolumn]{article}"));
    assert!(rewritten
        .contains("\\geometry{paperwidth=4in,paperheight=6in,margin=0.2in}\n\\begin{document}"));
    assert!(rewritten.contains("\\onecolumn \\maketitle"));
    assert!(rewritten.contains("width=0.5\\textwidth,height=0.5\\textheight,keepaspectratio"));

    assert!(is_empty_dir(fx.scratch.path()));

    assert_eq!(
        *log.stages.lock().unwrap(),
        vec![
            Stage::FetchMetadata,
            Stage::Download,
            Stage::Extract,
            Stage::Rewrite,
            Stage::Compile,
            Stage::Copy,
        ]
    );
    assert_eq!(log.completed.lock().unwrap().as_deref(), Some(pdf.as_path()));
}

#[tokio::test]
async fn bibliography_triggers_bibtex() {
    let fx = fixture(paper_routes(&[("main.tex", MAIN_TEX), ("refs.bib", "@misc{a}")])).await;

    let output = convert(ID, fx.out.path().join("paper.pdf"), &fx.config)
        .await
        .unwrap();
    assert!(output.stats.bibliography_ran);
}

#[tokio::test]
async fn landscape_swaps_page_size() {
    let mut fx = fixture(paper_routes(&[("main.tex", MAIN_TEX)])).await;
    fx.config.landscape = true;
    // The PDF tool only has to pass `--version`.
    let bin = tempfile::tempdir().unwrap();
    let pdf_tool = script(bin.path(), "pdftk", "exit 0");
    fx.config.pdf_tool_bin = pdf_tool.to_string_lossy().into_owned();

    let output = convert(ID, fx.out.path().join("wide"), &fx.config)
        .await
        .unwrap();
    let rewritten = std::fs::read_to_string(&output.pdf_path).unwrap();
    assert!(rewritten.contains("\\usepackage{pdflscape}"));
    assert!(rewritten.contains("\\geometry{paperwidth=6in,paperheight=4in,margin=0.2in}"));
}

#[tokio::test]
async fn duplicate_begin_document_fails_without_output() {
    let broken = "\\documentclass{article}\n\\begin{document}\nA\n\
                  \\begin{document}\n\\end{document}\n";
    let fx = fixture(paper_routes(&[("main.tex", broken)])).await;
    let dest = fx.out.path().join("paper.pdf");

    let err = convert(ID, &dest, &fx.config).await.unwrap_err();

    assert!(matches!(err, ConvertError::StructureError { found: 2, .. }), "{err:?}");
    assert!(err.is_expected());
    assert!(!dest.exists());
    assert!(is_empty_dir(fx.scratch.path()));
}

#[tokio::test]
async fn source_without_document_class_fails() {
    let fx = fixture(paper_routes(&[("notes.tex", "\\section{Notes}\n")])).await;

    let err = convert(ID, fx.out.path().join("paper"), &fx.config)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::MainDocumentNotFound { .. }), "{err:?}");
    assert!(is_empty_dir(fx.scratch.path()));
}

#[tokio::test]
async fn missing_archive_is_network_error() {
    let mut routes = paper_routes(&[("main.tex", MAIN_TEX)]);
    routes.remove(&format!("/e-print/{ID}"));
    let fx = fixture(routes).await;

    let err = convert(ID, fx.out.path().join("paper"), &fx.config)
        .await
        .unwrap_err();
    match err {
        ConvertError::Network { reason, .. } => assert!(reason.contains("404"), "{reason}"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(is_empty_dir(fx.scratch.path()));
}

#[tokio::test]
async fn page_without_title_is_reported() {
    let mut routes = paper_routes(&[("main.tex", MAIN_TEX)]);
    routes.insert(format!("/abs/{ID}"), (200, b"<html></html>".to_vec()));
    let fx = fixture(routes).await;

    let err = convert(ID, fx.out.path().join("paper"), &fx.config)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::TitleNotFound { .. }), "{err:?}");
}

#[test]
fn sync_wrapper_rejects_bad_identifier() {
    let err = arxiv_ereader::convert_sync("12.34", "paper.pdf", &ConversionConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConvertError::InvalidIdentifier { .. }));
}
