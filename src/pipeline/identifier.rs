//! Paper identifier parsing.
//!
//! Users paste whatever they have: a bare id, an abstract link, a PDF link,
//! or an e-print link. All of them carry the same new-style id
//! (`YYMM.NNNNN`, optionally `vN`), which is what the rest of the pipeline
//! needs.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// The URL prefix is optional and the match is unanchored, so any string that
// embeds an id (with or without scheme, `www.` or path) yields that id.
static RE_ARXIV_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?:
            https?://
            (?:www\.)?
            arxiv\.org/
            (?:abs|pdf|e-print)/
        )?
        (?P<id>
            \d{4}           # YYMM
            \.
            \d{4,5}         # sequence number
            (?:v\d{1,2})?   # version
        )",
    )
    .unwrap()
});

/// A validated arXiv identifier such as `2301.00001` or `2301.00001v2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(String);

impl PaperId {
    /// Extract the id from a raw id or an arxiv.org URL.
    pub fn parse(input: &str) -> Result<Self, ConvertError> {
        RE_ARXIV_ID
            .captures(input.trim())
            .and_then(|caps| caps.name("id"))
            .map(|m| PaperId(m.as_str().to_string()))
            .ok_or_else(|| ConvertError::InvalidIdentifier {
                input: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abstract page, used for the title.
    pub fn abs_url(&self, base_url: &str) -> String {
        format!("{}/abs/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Source archive download.
    pub fn eprint_url(&self, base_url: &str) -> String {
        format!("{}/e-print/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PaperId {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperId::parse(s)
    }
}
