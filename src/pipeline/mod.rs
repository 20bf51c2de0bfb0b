//! Pipeline stages for paper-to-e-reader conversion.
//!
//! Each submodule implements one step. The markup rules in [`markup`] are
//! pure string functions; [`style`] and [`document`] apply them to files.
//!
//! ## Data Flow
//!
//! ```text
//! identifier ──▶ fetch ──▶ style ──▶ document ──▶ compile
//! (id / URL)    (HTTP+tar) (.sty/.cls) (main .tex) (pdflatex)
//! ```
//!
//! 1. [`identifier`]: validate the id, build repository URLs
//! 2. [`fetch`]: title from the abstract page; stream and unpack the source
//!    archive (extraction runs in `spawn_blocking`)
//! 3. [`style`]: comment out page geometry and force one column in every
//!    bundled style file
//! 4. [`document`]: pick the main `.tex` file, strip its class options and
//!    inject the target page setup
//! 5. [`compile`]: check the toolchain, run three compiler passes with
//!    bibtex in between

pub mod compile;
pub mod document;
pub mod fetch;
pub mod identifier;
pub mod markup;
pub mod style;
