//! Markup substitutions: the individual text rewrites applied to LaTeX
//! sources.
//!
//! Nothing here parses LaTeX. Each rule is a regex substitution over raw
//! text, written as a pure `&str → String` function so it can be tested on
//! its own. [`crate::pipeline::style`] and [`crate::pipeline::document`]
//! decide which rules run on which file and in what order.
//!
//! Disabled directives are replaced by a `%` comment rather than deleted, so
//! a reader of the rewritten source can see what was taken out.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// ── Geometry loading and mutation ───────────────────────────────────────────

static RE_USEPACKAGE_GEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usepackage(\[[^\]]*\])?\{geometry\}").unwrap());
static RE_REQUIREPACKAGE_GEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\RequirePackage(\[[^\]]*\])?\{geometry\}").unwrap());
// `[^}]` and `\s` both cross newlines, so these catch multi-line arguments.
static RE_NEWGEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\newgeometry\s*\{[^}]*\}").unwrap());
static RE_NEWGEOMETRY_SINGLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\newgeometry[ \t]*\{[^}\n]*\}").unwrap());
static RE_GEOMETRY_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\geometry\s*\{[^}]*\}").unwrap());

/// `\usepackage[..]{geometry}` → comment.
pub fn disable_geometry_package(input: &str) -> String {
    RE_USEPACKAGE_GEOMETRY
        .replace_all(input, "% geometry disabled for e-reader layout")
        .into_owned()
}

/// `\RequirePackage[..]{geometry}` → comment.
pub fn disable_geometry_requirement(input: &str) -> String {
    RE_REQUIREPACKAGE_GEOMETRY
        .replace_all(input, "% geometry disabled for e-reader layout")
        .into_owned()
}

/// `\newgeometry{..}` → comment, even when the argument spans lines.
pub fn disable_newgeometry(input: &str) -> String {
    RE_NEWGEOMETRY
        .replace_all(input, "% newgeometry disabled for e-reader layout")
        .into_owned()
}

/// `\newgeometry{..}` → comment, only when the call closes on the same line.
///
/// The main document is rewritten line by line, so an argument that continues
/// on the next line is left alone there.
pub fn disable_newgeometry_in_line(line: &str) -> String {
    RE_NEWGEOMETRY_SINGLE_LINE
        .replace_all(line, "% newgeometry disabled for e-reader layout")
        .into_owned()
}

/// `\geometry{..}` → comment, even when the argument spans lines.
///
/// Must run after [`disable_newgeometry`]; otherwise the tail of
/// `\newgeometry` would be matched here.
pub fn disable_geometry_call(input: &str) -> String {
    RE_GEOMETRY_CALL
        .replace_all(input, "% geometry disabled for e-reader layout")
        .into_owned()
}

// ── Guards that would reject our geometry ───────────────────────────────────

// The optional `% ` prefix lets an already-disabled guard pass through
// unchanged, so rewriting a file twice does not stack comment markers.
static RE_IFPACKAGELOADED_GEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(% )?\\@ifpackageloaded\{geometry\}").unwrap());
static RE_GEOMETRY_PACKAGE_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(% )?\\PackageError\{[^}]*\}\{[^}]*geometry[^}]*\}\{[^}]*\}").unwrap()
});

fn comment_out(re: &Regex, input: &str) -> String {
    re.replace_all(input, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            format!("% {}", &caps[0])
        }
    })
    .into_owned()
}

/// `\@ifpackageloaded{geometry}` → `% \@ifpackageloaded{geometry}`.
///
/// Class files use this to raise an error when a user loads geometry.
pub fn disable_geometry_guard(input: &str) -> String {
    comment_out(&RE_IFPACKAGELOADED_GEOMETRY, input)
}

/// Comment out `\PackageError{..}{..geometry..}{..}`.
pub fn disable_geometry_package_error(input: &str) -> String {
    comment_out(&RE_GEOMETRY_PACKAGE_ERROR, input)
}

// ── Columns ─────────────────────────────────────────────────────────────────

static RE_TWOCOLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\twocolumn(\s*\[[^\]]*\])?").unwrap());

/// `\twocolumn` → `\onecolumn`.
///
/// The optional argument of `\twocolumn[..]` is material typeset after the
/// switch (usually the title block); it is kept, unbracketed, after
/// `\onecolumn`: `\twocolumn[\maketitle]` → `\onecolumn \maketitle`.
pub fn force_one_column(input: &str) -> String {
    RE_TWOCOLUMN
        .replace_all(input, |caps: &Captures<'_>| match caps.get(1) {
            Some(arg) => {
                let arg = arg.as_str().trim();
                format!("\\onecolumn {}", &arg[1..arg.len() - 1])
            }
            None => "\\onecolumn".to_string(),
        })
        .into_owned()
}

// ── Document class ──────────────────────────────────────────────────────────

static RE_POINT_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+pt\b").unwrap());
static RE_COLUMN_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+column\b").unwrap());
static RE_PAPER_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+paper\b").unwrap());
static RE_REPEATED_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*,)+").unwrap());
static RE_LEADING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*,\s*").unwrap());
static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*\]").unwrap());

static RE_CLASS_EMPTY_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\documentclass)\s*\[\s*\]").unwrap());
static RE_CLASS_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\documentclass\s*\[)").unwrap());
static RE_CLASS_NO_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\documentclass)\s*(\{)").unwrap());

/// Drop font size (`11pt`), column (`twocolumn`) and paper size (`a4paper`)
/// options from a `\documentclass` line, then tidy the commas left behind.
pub fn strip_class_options(line: &str) -> String {
    let line = RE_POINT_SIZE.replace_all(line, "");
    let line = RE_COLUMN_OPTION.replace_all(&line, "");
    let line = RE_PAPER_OPTION.replace_all(&line, "");
    let line = RE_REPEATED_COMMA.replace_all(&line, ",");
    let line = RE_LEADING_COMMA.replace_all(&line, "[");
    RE_TRAILING_COMMA.replace_all(&line, "]").into_owned()
}

/// Make `onecolumn` the first `\documentclass` option.
pub fn ensure_onecolumn_option(line: &str) -> String {
    if RE_CLASS_EMPTY_OPTIONS.is_match(line) {
        RE_CLASS_EMPTY_OPTIONS
            .replace(line, "${1}[onecolumn]")
            .into_owned()
    } else if RE_CLASS_OPTIONS.is_match(line) {
        RE_CLASS_OPTIONS.replace(line, "${1}onecolumn,").into_owned()
    } else {
        RE_CLASS_NO_OPTIONS
            .replace(line, "${1}[onecolumn]${2}")
            .into_owned()
    }
}

// ── Figures ─────────────────────────────────────────────────────────────────

static RE_INCLUDEGRAPHICS_WIDTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\includegraphics\[width=([.\d]+)\\(?:line|text)width\]").unwrap()
});

/// Bound figures by page height as well as width.
///
/// `\includegraphics[width=0.8\linewidth]` becomes
/// `\includegraphics[width=0.8\textwidth,height=0.8\textheight,keepaspectratio]`
/// so a tall figure shrinks to fit a short page instead of running off it.
pub fn fit_images_to_page(input: &str) -> String {
    RE_INCLUDEGRAPHICS_WIDTH
        .replace_all(input, |caps: &Captures<'_>| {
            let f = &caps[1];
            format!(
                "\\includegraphics[width={f}\\textwidth,height={f}\\textheight,keepaspectratio]"
            )
        })
        .into_owned()
}
