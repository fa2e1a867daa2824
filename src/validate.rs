//! Retrieved-artifact validation
//!
//! Deliberately permissive on extensions: provider-reported file types are
//! not fully trustworthy, so an unexpected extension only produces a warning
//! while a missing or empty file is fatal.

use crate::model::{payload_extension, ArtifactFile, ArtifactKind};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("artifact not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("artifact is empty: {0}")]
    Empty(std::path::PathBuf),
}

/// Outcome of a passing validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Non-fatal observation about the artifact, if any
    pub warning: Option<String>,
}

impl ValidationReport {
    pub fn clean() -> Self {
        Self { warning: None }
    }

    pub fn with_warning(warning: impl Into<String>) -> Self {
        Self {
            warning: Some(warning.into()),
        }
    }
}

/// Checks that the artifact exists, is non-empty, and looks like a payload
///
/// Returns `Err` only for the fatal conditions; an unexpected extension and
/// the directory-fallback case pass with a warning attached.
pub fn validate(artifact: &ArtifactFile) -> Result<ValidationReport, ValidationError> {
    let path: &Path = &artifact.path;

    let metadata = std::fs::metadata(path).map_err(|_| ValidationError::NotFound(path.to_path_buf()))?;

    if let ArtifactKind::UnpackedDir = artifact.kind {
        debug!(path = %path.display(), "Validating directory-fallback artifact");
        return Ok(ValidationReport::with_warning(format!(
            "no payload file was identified; {} is the unpacked archive directory",
            path.display()
        )));
    }

    if metadata.len() == 0 {
        return Err(ValidationError::Empty(path.to_path_buf()));
    }

    if payload_extension(path).is_none() {
        let warning = format!(
            "unexpected artifact extension on {} (expected one of: {})",
            path.display(),
            crate::model::PAYLOAD_EXTENSIONS.join(", ")
        );
        warn!("{}", warning);
        return Ok(ValidationReport::with_warning(warning));
    }

    debug!(path = %path.display(), size = metadata.len(), "Artifact validated");
    Ok(ValidationReport::clean())
}
