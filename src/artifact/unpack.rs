//! Container archive unpacking and payload discovery
//!
//! `.tar.gz`/`.tgz` unpack natively (flate2 + tar); `.zip` goes through the
//! host `unzip` tool, the same way provider CLIs are subprocess details
//! elsewhere in the crate.

use crate::model::payload_extension;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("failed to unpack {archive}: {message}")]
    Archive { archive: PathBuf, message: String },

    #[error("required tool '{tool}' is unavailable for unpacking {archive}")]
    ToolUnavailable { tool: String, archive: PathBuf },

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Unpacks a container archive into `dest`, creating it if needed
pub async fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), UnpackError> {
    std::fs::create_dir_all(dest).map_err(|e| UnpackError::Archive {
        archive: archive.to_path_buf(),
        message: format!("cannot create {}: {}", dest.display(), e),
    })?;

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        unpack_tar_gz(archive, dest)
    } else if name.ends_with(".zip") {
        unpack_zip(archive, dest).await
    } else {
        Err(UnpackError::UnsupportedFormat(archive.to_path_buf()))
    }
}

fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<(), UnpackError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "Unpacking tar.gz");
    let file = File::open(archive).map_err(|e| UnpackError::Archive {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest).map_err(|e| UnpackError::Archive {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    })
}

async fn unpack_zip(archive: &Path, dest: &Path) -> Result<(), UnpackError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "Unpacking zip via unzip");
    let output = Command::new("unzip")
        .arg("-o")
        .arg("-q")
        .arg(archive)
        .arg("-d")
        .arg(dest)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UnpackError::ToolUnavailable {
                    tool: "unzip".to_string(),
                    archive: archive.to_path_buf(),
                }
            } else {
                UnpackError::Archive {
                    archive: archive.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        return Err(UnpackError::Archive {
            archive: archive.to_path_buf(),
            message: format!(
                "unzip exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// Scans `dir` recursively for the first file with an expected payload
/// extension. Matches are sorted so the result is stable across filesystems.
pub fn find_payload(dir: &Path) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = Vec::new();

    for entry in ignore::WalkBuilder::new(dir).standard_filters(false).build() {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                    && payload_extension(path).is_some()
                {
                    matches.push(path.to_path_buf());
                }
            }
            Err(e) => warn!(error = %e, "Skipping unreadable entry during payload scan"),
        }
    }

    matches.sort();
    matches.into_iter().next()
}
