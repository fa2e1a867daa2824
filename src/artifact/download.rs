//! Streamed artifact download with manual redirect handling
//!
//! reqwest's automatic redirect policy drops custom headers on cross-origin
//! hops, and provider artifact endpoints redirect to signed storage URLs that
//! may still expect the original auth header. The retriever therefore follows
//! 301/302 responses itself, re-issuing the request against the `Location`
//! header with the locator's auth header intact.

use super::unpack::{find_payload, unpack_archive, UnpackError};
use crate::model::{is_archive, payload_extension, ArtifactFile, ArtifactLocator};
use crate::progress::ProgressReporter;
use futures_util::StreamExt;
use reqwest::{redirect, Client, Response, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// A download that makes no progress for this long is abandoned
pub const DOWNLOAD_STALL_CEILING: Duration = Duration::from_secs(300);

const MAX_REDIRECTS: u32 = 10;
const FALLBACK_FILENAME: &str = "artifact.zip";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download of {url} failed with HTTP {status}")]
    Http { url: String, status: StatusCode },

    #[error("transport error downloading {url}: {message}")]
    Transport { url: String, message: String },

    #[error("download stalled for more than {}s", DOWNLOAD_STALL_CEILING.as_secs())]
    Stalled,

    #[error("redirect from {url} carried no Location header")]
    MissingLocation { url: String },

    #[error("more than {MAX_REDIRECTS} redirects downloading {url}")]
    TooManyRedirects { url: String },

    #[error("invalid redirect target '{location}'")]
    BadRedirect { location: String },

    #[error("i/o error writing {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Unpack(#[from] UnpackError),
}

/// Downloads and unpacks build artifacts
pub struct Retriever {
    http_client: Client,
    stall_ceiling: Duration,
}

impl Retriever {
    pub fn new() -> Self {
        Self::with_stall_ceiling(DOWNLOAD_STALL_CEILING)
    }

    pub fn with_stall_ceiling(stall_ceiling: Duration) -> Self {
        // Redirects are followed manually so the auth header survives hops.
        let http_client = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!("airlift/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            stall_ceiling,
        }
    }

    /// Downloads the locator's payload into `dest_dir`
    ///
    /// Archives (`.zip`, `.tar.gz`, `.tgz`) are unpacked into a sibling
    /// directory and scanned for a payload file. When no payload is found the
    /// unpacked directory itself is returned as a degraded-but-valid
    /// [`ArtifactFile`] so the caller still has something actionable.
    pub async fn retrieve(
        &self,
        locator: &ArtifactLocator,
        dest_dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<ArtifactFile, DownloadError> {
        std::fs::create_dir_all(dest_dir).map_err(|e| DownloadError::Io {
            path: dest_dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let response = self.follow_redirects(locator).await?;
        let file_path = dest_dir.join(filename_for(&response));
        let size = self.stream_to_file(response, &file_path, reporter).await?;
        info!(path = %file_path.display(), size, "Artifact downloaded");

        if let Some(ext) = payload_extension(&file_path) {
            return Ok(ArtifactFile::package(file_path, size, ext));
        }

        if is_archive(&file_path) {
            return self.unpack_and_locate(&file_path).await;
        }

        // Unrecognized extension: hand it through untouched, the validator
        // will attach a warning.
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string();
        Ok(ArtifactFile::package(file_path, size, ext))
    }

    async fn follow_redirects(&self, locator: &ArtifactLocator) -> Result<Response, DownloadError> {
        let mut url = locator.url.clone();

        for hop in 0..=MAX_REDIRECTS {
            let mut request = self.http_client.get(&url);
            if let Some((name, value)) = &locator.auth_header {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send().await.map_err(|e| DownloadError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| DownloadError::MissingLocation { url: url.clone() })?;

                // Location may be relative; resolve against the current URL.
                let base = Url::parse(&url).map_err(|_| DownloadError::BadRedirect {
                    location: location.clone(),
                })?;
                let next = base.join(&location).map_err(|_| DownloadError::BadRedirect {
                    location: location.clone(),
                })?;

                debug!(hop, from = %url, to = %next, "Following redirect");
                url = next.to_string();
                continue;
            }

            if !status.is_success() {
                return Err(DownloadError::Http { url, status });
            }

            return Ok(response);
        }

        Err(DownloadError::TooManyRedirects {
            url: locator.url.clone(),
        })
    }

    async fn stream_to_file(
        &self,
        response: Response,
        path: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<u64, DownloadError> {
        let total = response.content_length();
        reporter.start(total);

        let mut file = tokio::fs::File::create(path).await.map_err(|e| DownloadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let url = response.url().to_string();
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        loop {
            // Each chunk must arrive within the stall ceiling.
            let chunk = match tokio::time::timeout(self.stall_ceiling, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    reporter.finish();
                    return Err(DownloadError::Transport {
                        url,
                        message: e.to_string(),
                    });
                }
                Ok(None) => break,
                Err(_) => {
                    reporter.finish();
                    return Err(DownloadError::Stalled);
                }
            };

            file.write_all(&chunk).await.map_err(|e| DownloadError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            received += chunk.len() as u64;
            reporter.update(received);
        }

        file.flush().await.map_err(|e| DownloadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        reporter.finish();

        if let Some(total) = total {
            if received != total {
                warn!(received, declared = total, "Downloaded size differs from content-length");
            }
        }
        Ok(received)
    }

    async fn unpack_and_locate(&self, archive: &Path) -> Result<ArtifactFile, DownloadError> {
        let dest = unpack_dir_for(archive);
        unpack_archive(archive, &dest).await?;

        match find_payload(&dest) {
            Some(payload) => {
                let size = std::fs::metadata(&payload)
                    .map_err(|e| DownloadError::Io {
                        path: payload.clone(),
                        message: e.to_string(),
                    })?
                    .len();
                // payload_extension matched during the scan
                let ext = payload_extension(&payload).unwrap_or("bin");
                info!(payload = %payload.display(), "Found payload inside archive");
                Ok(ArtifactFile::package(payload, size, ext))
            }
            None => {
                // Deliberate degraded success: report the unpacked directory
                // rather than failing, flagged as a distinct kind.
                warn!(dir = %dest.display(), "No payload file inside archive, returning unpacked directory");
                Ok(ArtifactFile::unpacked_dir(dest))
            }
        }
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new()
    }
}

/// Sibling directory an archive unpacks into (`x.zip` → `x.unpacked/`)
fn unpack_dir_for(archive: &Path) -> PathBuf {
    let stem = archive
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n))
        .unwrap_or("artifact");
    archive.with_file_name(format!("{}.unpacked", stem))
}

/// File name for the downloaded bytes: Content-Disposition when present,
/// otherwise the final URL's last path segment, otherwise a zip fallback
/// (provider artifact endpoints serve zip containers by default).
fn filename_for(response: &Response) -> String {
    if let Some(disposition) = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(name) = parse_disposition_filename(disposition) {
            return name;
        }
    }

    let segment = response
        .url()
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    if segment.contains('.') {
        return segment.to_string();
    }

    FALLBACK_FILENAME.to_string()
}

fn parse_disposition_filename(disposition: &str) -> Option<String> {
    let marker = "filename=";
    let idx = disposition.find(marker)?;
    let raw = disposition[idx + marker.len()..]
        .split(';')
        .next()?
        .trim()
        .trim_matches('"');
    if raw.is_empty() {
        None
    } else {
        // Strip any path the server smuggled in.
        Some(raw.rsplit(['/', '\\']).next().unwrap_or(raw).to_string())
    }
}
