//! Fetching: paper title from the abstract page, source archive from the
//! e-print endpoint.
//!
//! The archive is streamed to disk chunk by chunk rather than buffered, then
//! unpacked with `tar` + `flate2` on a blocking thread. Both requests are
//! made once; any failure ends the conversion.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::pipeline::identifier::PaperId;
use crate::progress::{ConversionProgressCallback, Stage};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>([^<]+)</title>").unwrap());
static RE_ID_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\]]+\]\s*").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Longest file stem used for the downloaded archive, in bytes.
const MAX_STEM_BYTES: usize = 150;

/// A source archive that has been downloaded and unpacked next to itself.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    /// The `.tar.gz` as saved in the destination directory.
    pub path: PathBuf,
    pub bytes: u64,
}

/// HTTP access to the preprint repository.
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: Option<u64>,
}

impl Fetcher {
    pub fn new(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("arxiv-ereader/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.download_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.download_timeout_secs,
        })
    }

    /// Fetch the abstract page and return the cleaned-up paper title.
    pub async fn fetch_title(&self, id: &PaperId) -> Result<String, ConvertError> {
        let url = id.abs_url(&self.base_url);
        debug!("Fetching metadata from {}", url);

        let response = self.get(&url).await?;
        let html = response.text().await.map_err(|e| self.network_error(&url, e))?;

        extract_title(&html).ok_or(ConvertError::TitleNotFound { url })
    }

    /// Stream the source archive into `dest_dir/<title>.tar.gz` and unpack it
    /// there.
    pub async fn fetch_source(
        &self,
        id: &PaperId,
        title: &str,
        dest_dir: &Path,
        progress: Option<&dyn ConversionProgressCallback>,
    ) -> Result<FetchedArchive, ConvertError> {
        let url = id.eprint_url(&self.base_url);
        let archive_path = dest_dir.join(format!("{}.tar.gz", archive_stem(title, id)));

        info!("Downloading {}...", id);
        debug!("Archive URL: {}", url);

        let response = self.get(&url).await?;
        let total = response.content_length();

        let mut file = tokio::fs::File::create(&archive_path)
            .await
            .map_err(|e| ConvertError::io(&archive_path, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.network_error(&url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ConvertError::io(&archive_path, e))?;
            downloaded += chunk.len() as u64;
            if let Some(cb) = progress {
                cb.on_download_progress(downloaded, total);
            }
        }
        file.flush()
            .await
            .map_err(|e| ConvertError::io(&archive_path, e))?;
        drop(file);

        debug!("Saved {} bytes to {}", downloaded, archive_path.display());

        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Extract);
        }
        extract_archive(&archive_path, dest_dir).await?;

        Ok(FetchedArchive {
            path: archive_path,
            bytes: downloaded,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ConvertError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.network_error(url, e))?;

        if !response.status().is_success() {
            return Err(ConvertError::Network {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response)
    }

    fn network_error(&self, url: &str, e: reqwest::Error) -> ConvertError {
        match self.timeout_secs {
            Some(secs) if e.is_timeout() => ConvertError::NetworkTimeout {
                url: url.to_string(),
                secs,
            },
            _ => ConvertError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// Unpack a gzipped tarball into `dest_dir`.
///
/// Runs on the blocking pool; `tar` refuses entries that would escape
/// `dest_dir`.
pub async fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<(), ConvertError> {
    let archive = archive.to_path_buf();
    let dest = dest_dir.to_path_buf();
    debug!("Extracting to {}", dest.display());

    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive, &dest))
        .await
        .map_err(|e| ConvertError::Internal(format!("Extract task panicked: {e}")))?
}

fn extract_archive_blocking(archive_path: &Path, dest_dir: &Path) -> Result<(), ConvertError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let file =
        std::fs::File::open(archive_path).map_err(|e| ConvertError::io(archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(std::io::BufReader::new(file)));

    archive.unpack(dest_dir).map_err(|e| ConvertError::Archive {
        path: archive_path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// First `<title>` of the page, minus the `[id] ` prefix, whitespace collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = RE_TITLE.captures(html)?.get(1)?.as_str();
    let title = RE_ID_PREFIX.replace(raw, "");
    let title = RE_WHITESPACE.replace_all(&title, " ").trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// A file stem derived from the title that is safe on every platform.
fn archive_stem(title: &str, id: &PaperId) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    let mut end = cleaned.len().min(MAX_STEM_BYTES);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    let stem = cleaned[..end].trim_end();

    if stem.is_empty() {
        id.as_str().to_string()
    } else {
        stem.to_string()
    }
}
