//! Expo EAS adapter (mobile-build service)
//!
//! EAS documents no REST contract for triggering builds, only the `eas` CLI,
//! so this adapter shells out and parses the CLI's `--json` output. The
//! subprocess stays an implementation detail behind [`CiProvider`]; callers
//! cannot tell it apart from the HTTP adapters.
//!
//! For this provider the build target's `repo` field is the local Expo
//! project directory the CLI runs in.

use super::{CiProvider, ProviderError};
use crate::model::{ArtifactLocator, BuildHandle, BuildStatus, BuildTarget, ProviderKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::io;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

const EAS_BIN: &str = "eas";
const DEFAULT_PROFILE: &str = "preview";

/// Adapter driving the `eas` CLI
pub struct ExpoEas {
    profile: String,
    /// Passed through to the CLI's own `EXPO_TOKEN` auth; the CLI may also be
    /// logged in interactively, so absence is not an error here.
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EasBuild {
    id: String,
    status: Option<String>,
    #[serde(default)]
    artifacts: Option<EasArtifacts>,
}

#[derive(Debug, Deserialize)]
struct EasArtifacts {
    #[serde(rename = "buildUrl")]
    build_url: Option<String>,
}

impl ExpoEas {
    /// Creates an adapter from the environment
    ///
    /// Reads `EXPO_TOKEN` (optional) and `AIRLIFT_EAS_PROFILE` (optional,
    /// default `preview`) once at construction. A missing `eas` binary only
    /// surfaces when a call is made, as [`ProviderError::ToolUnavailable`].
    pub fn from_env() -> Self {
        Self {
            profile: env::var("AIRLIFT_EAS_PROFILE").unwrap_or_else(|_| DEFAULT_PROFILE.to_string()),
            token: env::var("EXPO_TOKEN").ok(),
        }
    }

    async fn run_eas(&self, cwd: Option<&PathBuf>, args: &[&str]) -> Result<std::process::Output, ProviderError> {
        let mut cmd = Command::new(EAS_BIN);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        if let Some(token) = &self.token {
            cmd.env("EXPO_TOKEN", token);
        }

        debug!(args = ?args, "Running eas");
        cmd.output().await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProviderError::ToolUnavailable {
                    tool: EAS_BIN.to_string(),
                    message: "install it with 'npm install -g eas-cli'".to_string(),
                }
            } else {
                ProviderError::ToolUnavailable {
                    tool: EAS_BIN.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn map_status(status: Option<&str>) -> BuildStatus {
        match status {
            Some("NEW") | Some("IN_QUEUE") | Some("PENDING_CANCEL") => BuildStatus::Pending,
            Some("IN_PROGRESS") => BuildStatus::Running,
            Some("FINISHED") => BuildStatus::Succeeded,
            Some("ERRORED") => BuildStatus::Failed,
            Some("CANCELED") => BuildStatus::Canceled,
            _ => BuildStatus::Unknown,
        }
    }

    fn build_id(handle: &BuildHandle) -> Result<&str, ProviderError> {
        handle
            .build_id
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_handle(handle, "handle has no build id"))
    }

    async fn view_build(&self, handle: &BuildHandle) -> Result<EasBuild, ProviderError> {
        let id = Self::build_id(handle)?;
        let output = self.run_eas(None, &["build:view", "--json", id]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::transient(
                handle,
                format!("eas build:view exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::transient(handle, format!("invalid eas JSON: {}", e)))
    }
}

#[async_trait]
impl CiProvider for ExpoEas {
    async fn trigger(&self, target: &BuildTarget) -> Result<BuildHandle, ProviderError> {
        let platform = target.platform.as_deref().unwrap_or("android");
        let project_dir = PathBuf::from(&target.repo);

        let output = self
            .run_eas(
                Some(&project_dir),
                &[
                    "build",
                    "--platform",
                    platform,
                    "--profile",
                    &self.profile,
                    "--non-interactive",
                    "--no-wait",
                    "--json",
                ],
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Trigger {
                provider: ProviderKind::Expo,
                message: format!("eas build exited with {}: {}", output.status, stderr.trim()),
            });
        }

        // `eas build --json` prints an array of started builds.
        let builds: Vec<EasBuild> = serde_json::from_slice(&output.stdout).map_err(|e| ProviderError::Trigger {
            provider: ProviderKind::Expo,
            message: format!("invalid eas JSON: {}", e),
        })?;

        let build = builds.into_iter().next().ok_or_else(|| ProviderError::Trigger {
            provider: ProviderKind::Expo,
            message: "eas reported no started build".to_string(),
        })?;

        debug!(build_id = %build.id, "Started EAS build");
        Ok(BuildHandle::for_build(ProviderKind::Expo, build.id).with_branch(&target.git_ref))
    }

    async fn query_status(&self, handle: &BuildHandle) -> Result<BuildStatus, ProviderError> {
        let build = self.view_build(handle).await?;
        let status = Self::map_status(build.status.as_deref());
        debug!(handle = %handle, %status, "Queried build status");
        Ok(status)
    }

    async fn resolve_artifact(&self, handle: &BuildHandle) -> Result<ArtifactLocator, ProviderError> {
        let build = self.view_build(handle).await?;

        match build.artifacts.and_then(|a| a.build_url) {
            // Build URLs are pre-signed, no auth header needed.
            Some(url) => Ok(ArtifactLocator::new(url)),
            None => {
                warn!(handle = %handle, "EAS build finished without a build URL");
                Err(ProviderError::NoArtifact { handle: handle.short() })
            }
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Expo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        new = { Some("NEW"), BuildStatus::Pending },
        queued = { Some("IN_QUEUE"), BuildStatus::Pending },
        in_progress = { Some("IN_PROGRESS"), BuildStatus::Running },
        finished = { Some("FINISHED"), BuildStatus::Succeeded },
        errored = { Some("ERRORED"), BuildStatus::Failed },
        canceled = { Some("CANCELED"), BuildStatus::Canceled },
        missing = { None, BuildStatus::Unknown },
    )]
    fn test_status_mapping(status: Option<&str>, expected: BuildStatus) {
        assert_eq!(ExpoEas::map_status(status), expected);
    }

    #[test]
    fn test_handle_without_build_id_is_fatal_not_transient() {
        let handle = BuildHandle::for_run(ProviderKind::Expo, "proj", "1");
        let err = ExpoEas::build_id(&handle).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidHandle { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_build_json_parsing() {
        let json = r#"{"id":"abc","status":"FINISHED","artifacts":{"buildUrl":"https://cdn/app.apk"}}"#;
        let build: EasBuild = serde_json::from_str(json).unwrap();
        assert_eq!(build.id, "abc");
        assert_eq!(build.status.as_deref(), Some("FINISHED"));
        assert_eq!(
            build.artifacts.unwrap().build_url.as_deref(),
            Some("https://cdn/app.apk")
        );
    }
}
