//! Compilation: locate the TeX toolchain and run it over the rewritten
//! document.
//!
//! ## Why three compiler passes?
//!
//! The first pass writes the `.aux` file with citation and label data, bibtex
//! turns that into a `.bbl`, the second pass pulls the bibliography in, and
//! the third settles forward references (table of contents, citation
//! numbers) whose page numbers moved during the second.
//!
//! Exit codes are not checked between passes: LaTeX exits non-zero for many
//! recoverable problems in `nonstopmode` and usually still produces a usable
//! PDF. Only a missing PDF at the end is fatal.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::progress::{CompileStep, ConversionProgressCallback};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of compiler invocations per conversion.
pub const LATEX_PASSES: u32 = 3;

/// Lines of the LaTeX log shown when no PDF is produced.
const LOG_TAIL_LINES: usize = 20;

/// Resolved external programs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub latex: PathBuf,
    /// Resolved lazily: bibtex is only needed for papers with a bibliography.
    pub bibtex: String,
}

impl Toolchain {
    /// Check that the compiler (and, for landscape, the PDF tool) exist and
    /// run.
    ///
    /// The PDF tool is only checked, never run: landscape output comes from
    /// the swapped page size and `pdflscape`.
    pub async fn resolve(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let latex = check_binary(&config.latex_bin, "please install TeX Live").await?;
        if config.landscape {
            check_binary(&config.pdf_tool_bin, "required for landscape mode").await?;
        }
        Ok(Self {
            latex,
            bibtex: config.bibtex_bin.clone(),
        })
    }
}

/// Resolve `name` on `PATH` and confirm `name --version` succeeds.
pub async fn check_binary(name: &str, hint: &str) -> Result<PathBuf, ConvertError> {
    let missing = || ConvertError::MissingDependency {
        binary: name.to_string(),
        hint: hint.to_string(),
    };

    let path = which::which(name).map_err(|_| missing())?;
    let status = Command::new(&path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|_| missing())?;

    if !status.success() {
        debug!("{} --version exited with {}", path.display(), status);
        return Err(missing());
    }
    debug!("Found {} at {}", name, path.display());
    Ok(path)
}

/// What the compile stage did.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub pdf_path: PathBuf,
    pub bibliography_ran: bool,
    pub latex_passes: u32,
}

/// Drives the compiler over one main document.
pub struct CompilerDriver<'a> {
    toolchain: &'a Toolchain,
    show_output: bool,
    progress: Option<&'a dyn ConversionProgressCallback>,
}

impl<'a> CompilerDriver<'a> {
    pub fn new(
        toolchain: &'a Toolchain,
        show_output: bool,
        progress: Option<&'a dyn ConversionProgressCallback>,
    ) -> Self {
        Self {
            toolchain,
            show_output,
            progress,
        }
    }

    /// Compile `main_tex` inside `work_dir` and return the PDF's location.
    pub async fn compile(
        &self,
        work_dir: &Path,
        main_tex: &Path,
    ) -> Result<CompileReport, ConvertError> {
        let no_name = || ConvertError::Internal(format!("no file name: {}", main_tex.display()));
        let file_name = main_tex.file_name().ok_or_else(no_name)?;
        let stem = main_tex
            .file_stem()
            .ok_or_else(no_name)?
            .to_string_lossy()
            .into_owned();

        self.latex_pass(work_dir, file_name.as_ref(), 1).await?;

        let bibliography_ran = needs_bibliography(work_dir, &stem).await?;
        if bibliography_ran {
            debug!("Running bibtex...");
            self.notify(CompileStep::Bibtex);
            let mut cmd = Command::new(&self.toolchain.bibtex);
            cmd.arg(&stem);
            self.run(cmd, &self.toolchain.bibtex, work_dir).await?;
        }

        for pass in 2..=LATEX_PASSES {
            self.latex_pass(work_dir, file_name.as_ref(), pass).await?;
        }

        let pdf_path = work_dir.join(format!("{stem}.pdf"));
        if !path_exists(&pdf_path).await? {
            report_log_tail(&work_dir.join(format!("{stem}.log"))).await;
            return Err(ConvertError::ArtifactMissing { path: pdf_path });
        }

        Ok(CompileReport {
            pdf_path,
            bibliography_ran,
            latex_passes: LATEX_PASSES,
        })
    }

    async fn latex_pass(
        &self,
        work_dir: &Path,
        file_name: &Path,
        pass: u32,
    ) -> Result<(), ConvertError> {
        info!("Compiling LaTeX (pass {}/{})...", pass, LATEX_PASSES);
        self.notify(CompileStep::Latex {
            pass,
            total: LATEX_PASSES,
        });
        let mut cmd = Command::new(&self.toolchain.latex);
        cmd.arg("-interaction=nonstopmode").arg(file_name);
        self.run(cmd, &self.toolchain.latex.to_string_lossy(), work_dir)
            .await
    }

    /// Run to completion in `work_dir`. Only a failure to start is an error.
    async fn run(
        &self,
        mut cmd: Command,
        program: &str,
        work_dir: &Path,
    ) -> Result<(), ConvertError> {
        let (stdout, stderr) = if self.show_output {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let status = cmd
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| ConvertError::MissingDependency {
                binary: program.to_string(),
                hint: format!("failed to start: {e}"),
            })?;

        if !status.success() {
            debug!("{} exited with {}", program, status);
        }
        Ok(())
    }

    fn notify(&self, step: CompileStep) {
        if let Some(cb) = self.progress {
            cb.on_compile_pass(step);
        }
    }
}

/// bibtex runs when the source ships a `.bib` database or a prebuilt `.bbl`.
pub async fn needs_bibliography(work_dir: &Path, stem: &str) -> Result<bool, ConvertError> {
    if path_exists(&work_dir.join(format!("{stem}.bbl"))).await? {
        return Ok(true);
    }
    let mut entries = tokio::fs::read_dir(work_dir)
        .await
        .map_err(|e| ConvertError::io(work_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(work_dir, e))?
    {
        if entry.path().extension().is_some_and(|ext| ext == "bib") {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn path_exists(path: &Path) -> Result<bool, ConvertError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| ConvertError::io(path, e))
}

/// Last lines of a LaTeX log, or `None` if it cannot be read.
pub async fn log_tail(log_path: &Path, lines: usize) -> Option<String> {
    let bytes = tokio::fs::read(log_path).await.ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    Some(all[start..].join("\n"))
}

async fn report_log_tail(log_path: &Path) {
    match log_tail(log_path, LOG_TAIL_LINES).await {
        Some(tail) => warn!("LaTeX log ({}):\n{}", log_path.display(), tail),
        None => warn!("No LaTeX log at {}", log_path.display()),
    }
}
