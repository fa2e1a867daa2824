//! Core data model for the build-to-device pipeline
//!
//! Every downstream entity here is conditioned on the upstream one reaching a
//! specific terminal variant: an [`ArtifactLocator`] only exists for a build
//! whose [`BuildStatus`] was `Succeeded`, and a [`DeliveryOutcome`] only
//! exists for an [`ArtifactFile`] that passed validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// CI backend selection tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Remote workflow-dispatch service (GitHub Actions)
    Github,
    /// Build-API service (Codemagic)
    Codemagic,
    /// Mobile-build service driven through its CLI (Expo EAS)
    Expo,
}

impl ProviderKind {
    /// Parses a provider tag from its lowercase CLI/env spelling
    pub fn from_lower_str(s: &str) -> Option<Self> {
        match s {
            "github" => Some(ProviderKind::Github),
            "codemagic" => Some(ProviderKind::Codemagic),
            "expo" | "eas" => Some(ProviderKind::Expo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github",
            ProviderKind::Codemagic => "codemagic",
            ProviderKind::Expo => "expo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to build: repository or app slug, ref, and optional platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Repository (`owner/name`) or provider-native app slug
    pub repo: String,

    /// Branch or ref to build
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Target platform hint (e.g. "android", "ios"), provider-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl BuildTarget {
    pub fn new(repo: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            git_ref: git_ref.into(),
            platform: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

/// Opaque identifier for a triggered build
///
/// The shape depends on the provider: workflow-dispatch backends identify a
/// build by repository + run id, build-API backends by a single build id.
/// Immutable once created; serialized as plain JSON so it can cross process
/// boundaries between `trigger` and `poll` invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildHandle {
    pub provider: ProviderKind,

    /// Workflow run identifier (workflow-dispatch providers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Build identifier (build-API providers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl BuildHandle {
    /// Handle for a repository + run-id pair
    pub fn for_run(provider: ProviderKind, repo: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            provider,
            run_id: Some(run_id.into()),
            build_id: None,
            repo: Some(repo.into()),
            branch: None,
        }
    }

    /// Handle for a single build-identifier string
    pub fn for_build(provider: ProviderKind, build_id: impl Into<String>) -> Self {
        Self {
            provider,
            run_id: None,
            build_id: Some(build_id.into()),
            repo: None,
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Short human-readable identifier for logs and error context
    pub fn short(&self) -> String {
        let id = self
            .run_id
            .as_deref()
            .or(self.build_id.as_deref())
            .unwrap_or("?");
        match &self.repo {
            Some(repo) => format!("{}:{}#{}", self.provider, repo, id),
            None => format!("{}#{}", self.provider, id),
        }
    }
}

impl fmt::Display for BuildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Backend-reported build state, produced once per poll attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    /// Backend returned a state this adapter does not recognize
    Unknown,
}

impl BuildStatus {
    /// Terminal states end the poll loop; `Unknown` does not (it is treated
    /// as in-flight and retried until the timeout budget runs out).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Canceled
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
            BuildStatus::Canceled => "canceled",
            BuildStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Retrieval descriptor for a finished build's artifact
///
/// Only constructed after a `Succeeded` status; the poller enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocator {
    pub url: String,

    /// Header name/value the download must carry (e.g. a bearer token).
    /// Preserved across redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<(String, String)>,
}

impl ArtifactLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_header: None,
        }
    }

    pub fn with_auth(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_header = Some((name.into(), value.into()));
        self
    }
}

/// What the retriever actually produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ArtifactKind {
    /// A singular payload file with the given extension
    Package { extension: String },
    /// Degraded result: the unpacked archive directory, because no file with
    /// an expected payload extension was found inside
    UnpackedDir,
}

/// A retrieved artifact on the local filesystem
///
/// May outlive the process; cleanup is an external retention concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: ArtifactKind,
}

impl ArtifactFile {
    pub fn package(path: PathBuf, size_bytes: u64, extension: impl Into<String>) -> Self {
        Self {
            path,
            size_bytes,
            kind: ArtifactKind::Package {
                extension: extension.into(),
            },
        }
    }

    pub fn unpacked_dir(path: PathBuf) -> Self {
        Self {
            path,
            size_bytes: 0,
            kind: ArtifactKind::UnpackedDir,
        }
    }

    /// True when retrieval degraded to returning a directory
    pub fn is_directory_fallback(&self) -> bool {
        matches!(self.kind, ArtifactKind::UnpackedDir)
    }
}

/// Terminal output of the whole pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeliveryOutcome {
    /// The system-installer handoff accepted the artifact
    InstalledViaPrimary { artifact: ArtifactFile },
    /// The device bridge installed the artifact directly
    InstalledViaSecondary { artifact: ArtifactFile },
    /// No automatic method worked; manual instructions were emitted
    ManualRequired { artifact: ArtifactFile },
}

impl DeliveryOutcome {
    pub fn artifact(&self) -> &ArtifactFile {
        match self {
            DeliveryOutcome::InstalledViaPrimary { artifact }
            | DeliveryOutcome::InstalledViaSecondary { artifact }
            | DeliveryOutcome::ManualRequired { artifact } => artifact,
        }
    }

    /// True for the two automatic-install variants
    pub fn is_installed(&self) -> bool {
        !matches!(self, DeliveryOutcome::ManualRequired { .. })
    }
}

/// Payload extensions the pipeline considers "the real artifact"
pub const PAYLOAD_EXTENSIONS: &[&str] = &["apk", "aab", "ipa", "app"];

/// Container archive extensions the retriever will unpack
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar.gz", "tgz"];

/// Returns the payload extension of a path, if it has one
pub fn payload_extension(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    PAYLOAD_EXTENSIONS.iter().find(|e| **e == ext).copied()
}

/// True when the file name ends with a recognized container-archive suffix
pub fn is_archive(path: &std::path::Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_lowercase(),
        None => return false,
    };
    ARCHIVE_EXTENSIONS.iter().any(|e| name.ends_with(&format!(".{}", e)))
}
