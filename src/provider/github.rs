//! GitHub Actions adapter (remote workflow-dispatch service)
//!
//! Triggers a build by dispatching a workflow, then correlates the dispatch
//! with the newest `workflow_dispatch` run on the same branch (the dispatch
//! endpoint itself returns no run id). Status and artifact resolution go
//! through the Actions REST API with a bearer token.

use super::{CiProvider, ProviderError};
use crate::model::{ArtifactLocator, BuildHandle, BuildStatus, BuildTarget, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";
const DEFAULT_WORKFLOW: &str = "build.yml";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How long to wait for the dispatched run to appear in the runs list.
/// GitHub creates the run asynchronously after the dispatch returns 204.
const RUN_CORRELATION_ATTEMPTS: u32 = 5;
const RUN_CORRELATION_DELAY: Duration = Duration::from_secs(3);

/// GitHub Actions client
///
/// Thread-safe; the underlying [`Client`] pools connections.
pub struct GithubActions {
    token: String,
    workflow: String,
    api_base: String,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct RunsResponse {
    workflow_runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    id: u64,
    status: Option<String>,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactsResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    name: String,
    archive_download_url: String,
    expired: bool,
}

impl GithubActions {
    /// Creates an adapter from the environment
    ///
    /// Reads `GITHUB_TOKEN` (required) and `AIRLIFT_GITHUB_WORKFLOW`
    /// (optional, default `build.yml`) once at construction.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = env::var("GITHUB_TOKEN").map_err(|_| ProviderError::MissingCredential {
            provider: ProviderKind::Github,
            var: "GITHUB_TOKEN",
        })?;
        let workflow = env::var("AIRLIFT_GITHUB_WORKFLOW").unwrap_or_else(|_| DEFAULT_WORKFLOW.to_string());
        Ok(Self::new(token, workflow))
    }

    pub fn new(token: String, workflow: String) -> Self {
        Self::with_api_base(token, workflow, API_BASE.to_string())
    }

    /// Custom API base, used by tests pointing at a local server
    pub fn with_api_base(token: String, workflow: String, api_base: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("airlift/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            token,
            workflow,
            api_base,
            http_client,
        }
    }

    fn auth_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn latest_dispatch_run(&self, repo: &str, branch: &str) -> Result<Option<u64>, ProviderError> {
        let url = format!(
            "{}/repos/{}/actions/runs?event=workflow_dispatch&branch={}&per_page=1",
            self.api_base, repo, branch
        );
        let response = self
            .http_client
            .get(&url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::Trigger {
                provider: ProviderKind::Github,
                message: format!("run lookup failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Trigger {
                provider: ProviderKind::Github,
                message: format!("run lookup returned HTTP {}", response.status()),
            });
        }

        let runs: RunsResponse = response.json().await.map_err(|e| ProviderError::Trigger {
            provider: ProviderKind::Github,
            message: format!("run lookup returned invalid JSON: {}", e),
        })?;

        Ok(runs.workflow_runs.first().map(|r| r.id))
    }

    fn map_status(status: Option<&str>, conclusion: Option<&str>) -> BuildStatus {
        match status {
            Some("queued") | Some("waiting") | Some("pending") | Some("requested") => BuildStatus::Pending,
            Some("in_progress") => BuildStatus::Running,
            Some("completed") => match conclusion {
                Some("success") => BuildStatus::Succeeded,
                Some("cancelled") => BuildStatus::Canceled,
                Some("failure") | Some("timed_out") | Some("startup_failure") | Some("action_required") => {
                    BuildStatus::Failed
                }
                _ => BuildStatus::Unknown,
            },
            _ => BuildStatus::Unknown,
        }
    }

    fn run_id(handle: &BuildHandle) -> Result<(&str, &str), ProviderError> {
        let repo = handle
            .repo
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_handle(handle, "handle has no repo"))?;
        let run_id = handle
            .run_id
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_handle(handle, "handle has no run id"))?;
        Ok((repo, run_id))
    }
}

#[async_trait]
impl CiProvider for GithubActions {
    async fn trigger(&self, target: &BuildTarget) -> Result<BuildHandle, ProviderError> {
        let url = format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.api_base, target.repo, self.workflow
        );

        let mut inputs = serde_json::Map::new();
        if let Some(platform) = &target.platform {
            inputs.insert("platform".to_string(), serde_json::Value::String(platform.clone()));
        }
        let body = serde_json::json!({ "ref": target.git_ref, "inputs": inputs });

        debug!(repo = %target.repo, workflow = %self.workflow, "Dispatching workflow");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Trigger {
                provider: ProviderKind::Github,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Trigger {
                provider: ProviderKind::Github,
                message: format!("dispatch returned HTTP {}: {}", status, detail),
            });
        }

        // The dispatch endpoint returns 204 with no run id; find the run it
        // created. The run may take a few seconds to materialize.
        for attempt in 1..=RUN_CORRELATION_ATTEMPTS {
            if let Some(id) = self.latest_dispatch_run(&target.repo, &target.git_ref).await? {
                debug!(run_id = id, attempt, "Correlated dispatched run");
                return Ok(
                    BuildHandle::for_run(ProviderKind::Github, &target.repo, id.to_string())
                        .with_branch(&target.git_ref),
                );
            }
            tokio::time::sleep(RUN_CORRELATION_DELAY).await;
        }

        Err(ProviderError::Trigger {
            provider: ProviderKind::Github,
            message: format!(
                "workflow dispatched but no run appeared on branch '{}' within {} attempts",
                target.git_ref, RUN_CORRELATION_ATTEMPTS
            ),
        })
    }

    async fn query_status(&self, handle: &BuildHandle) -> Result<BuildStatus, ProviderError> {
        let (repo, run_id) = Self::run_id(handle)?;
        let url = format!("{}/repos/{}/actions/runs/{}", self.api_base, repo, run_id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::transient(handle, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::transient(
                handle,
                format!("status query returned HTTP {}", response.status()),
            ));
        }

        let run: Run = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(handle, format!("invalid status JSON: {}", e)))?;

        let status = Self::map_status(run.status.as_deref(), run.conclusion.as_deref());
        debug!(handle = %handle, %status, "Queried run status");
        Ok(status)
    }

    async fn resolve_artifact(&self, handle: &BuildHandle) -> Result<ArtifactLocator, ProviderError> {
        let (repo, run_id) = Self::run_id(handle)?;
        let url = format!("{}/repos/{}/actions/runs/{}/artifacts", self.api_base, repo, run_id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::transient(handle, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::transient(
                handle,
                format!("artifact listing returned HTTP {}", response.status()),
            ));
        }

        let listing: ArtifactsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(handle, format!("invalid artifact JSON: {}", e)))?;

        let artifact = listing
            .artifacts
            .iter()
            .find(|a| !a.expired)
            .ok_or_else(|| ProviderError::NoArtifact { handle: handle.short() })?;

        if listing.artifacts.len() > 1 {
            warn!(
                handle = %handle,
                count = listing.artifacts.len(),
                chosen = %artifact.name,
                "Run produced multiple artifacts, taking the first unexpired one"
            );
        }

        // Artifact downloads require the same bearer token; the download URL
        // redirects to short-lived signed storage.
        Ok(ArtifactLocator::new(&artifact.archive_download_url).with_auth("Authorization", self.auth_value()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        queued = { Some("queued"), None, BuildStatus::Pending },
        waiting = { Some("waiting"), None, BuildStatus::Pending },
        in_progress = { Some("in_progress"), None, BuildStatus::Running },
        success = { Some("completed"), Some("success"), BuildStatus::Succeeded },
        failure = { Some("completed"), Some("failure"), BuildStatus::Failed },
        timed_out = { Some("completed"), Some("timed_out"), BuildStatus::Failed },
        cancelled = { Some("completed"), Some("cancelled"), BuildStatus::Canceled },
        odd_conclusion = { Some("completed"), Some("neutral"), BuildStatus::Unknown },
        missing = { None, None, BuildStatus::Unknown },
    )]
    fn test_status_mapping(status: Option<&str>, conclusion: Option<&str>, expected: BuildStatus) {
        assert_eq!(GithubActions::map_status(status, conclusion), expected);
    }

    #[test]
    fn test_handle_without_run_id_is_fatal_not_transient() {
        // A build-id handle can never become a run-id handle; retrying it
        // would only burn the poll budget.
        let handle = BuildHandle::for_build(ProviderKind::Github, "not-a-run");
        let err = GithubActions::run_id(&handle).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidHandle { .. }));
        assert!(!err.is_transient());
    }
}
