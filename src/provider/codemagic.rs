//! Codemagic adapter (build-API service)
//!
//! Codemagic identifies a build by a single id returned from `POST /builds`;
//! the same `GET /builds/{id}` document carries both the status and, once the
//! build finishes, the artefact list with signed download URLs.

use super::{CiProvider, ProviderError};
use crate::model::{ArtifactLocator, BuildHandle, BuildStatus, BuildTarget, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.codemagic.io";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Codemagic REST client, authenticated with `x-auth-token`
pub struct Codemagic {
    token: String,
    workflow_id: Option<String>,
    api_base: String,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(rename = "buildId")]
    build_id: String,
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    build: Build,
}

#[derive(Debug, Deserialize)]
struct Build {
    status: Option<String>,
    #[serde(default)]
    artefacts: Vec<Artefact>,
}

#[derive(Debug, Deserialize)]
struct Artefact {
    url: String,
    #[serde(default)]
    name: String,
}

impl Codemagic {
    /// Creates an adapter from the environment
    ///
    /// Reads `CODEMAGIC_API_TOKEN` (required) and `AIRLIFT_CODEMAGIC_WORKFLOW`
    /// (optional workflow id for the trigger call) once at construction.
    pub fn from_env() -> Result<Self, ProviderError> {
        let token = env::var("CODEMAGIC_API_TOKEN").map_err(|_| ProviderError::MissingCredential {
            provider: ProviderKind::Codemagic,
            var: "CODEMAGIC_API_TOKEN",
        })?;
        let workflow_id = env::var("AIRLIFT_CODEMAGIC_WORKFLOW").ok();
        Ok(Self::with_api_base(token, workflow_id, API_BASE.to_string()))
    }

    pub fn with_api_base(token: String, workflow_id: Option<String>, api_base: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("airlift/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            token,
            workflow_id,
            api_base,
            http_client,
        }
    }

    fn map_status(status: Option<&str>) -> BuildStatus {
        match status {
            Some("queued") | Some("preparing") => BuildStatus::Pending,
            Some("building") | Some("testing") | Some("publishing") | Some("fetching") => BuildStatus::Running,
            Some("finished") => BuildStatus::Succeeded,
            Some("failed") | Some("timeout") | Some("warning") => BuildStatus::Failed,
            Some("canceled") | Some("skipped") => BuildStatus::Canceled,
            _ => BuildStatus::Unknown,
        }
    }

    fn build_id(handle: &BuildHandle) -> Result<&str, ProviderError> {
        handle
            .build_id
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_handle(handle, "handle has no build id"))
    }

    async fn fetch_build(&self, handle: &BuildHandle) -> Result<Build, ProviderError> {
        let id = Self::build_id(handle)?;
        let url = format!("{}/builds/{}", self.api_base, id);

        let response = self
            .http_client
            .get(&url)
            .header("x-auth-token", &self.token)
            .send()
            .await
            .map_err(|e| ProviderError::transient(handle, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::transient(
                handle,
                format!("build query returned HTTP {}", response.status()),
            ));
        }

        let body: BuildResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(handle, format!("invalid build JSON: {}", e)))?;
        Ok(body.build)
    }
}

#[async_trait]
impl CiProvider for Codemagic {
    async fn trigger(&self, target: &BuildTarget) -> Result<BuildHandle, ProviderError> {
        let url = format!("{}/builds", self.api_base);
        let mut body = serde_json::json!({
            "appId": target.repo,
            "branch": target.git_ref,
        });
        if let Some(workflow_id) = &self.workflow_id {
            body["workflowId"] = serde_json::Value::String(workflow_id.clone());
        }

        debug!(app = %target.repo, branch = %target.git_ref, "Starting Codemagic build");

        let response = self
            .http_client
            .post(&url)
            .header("x-auth-token", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Trigger {
                provider: ProviderKind::Codemagic,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Trigger {
                provider: ProviderKind::Codemagic,
                message: format!("build request returned HTTP {}: {}", status, detail),
            });
        }

        let trigger: TriggerResponse = response.json().await.map_err(|e| ProviderError::Trigger {
            provider: ProviderKind::Codemagic,
            message: format!("invalid trigger JSON: {}", e),
        })?;

        Ok(BuildHandle::for_build(ProviderKind::Codemagic, trigger.build_id).with_branch(&target.git_ref))
    }

    async fn query_status(&self, handle: &BuildHandle) -> Result<BuildStatus, ProviderError> {
        let build = self.fetch_build(handle).await?;
        let status = Self::map_status(build.status.as_deref());
        debug!(handle = %handle, %status, "Queried build status");
        Ok(status)
    }

    async fn resolve_artifact(&self, handle: &BuildHandle) -> Result<ArtifactLocator, ProviderError> {
        let build = self.fetch_build(handle).await?;

        // Prefer an artefact that already is a payload; otherwise take the
        // first one and let the retriever unpack it.
        let artefact = build
            .artefacts
            .iter()
            .find(|a| crate::model::payload_extension(std::path::Path::new(&a.name)).is_some())
            .or_else(|| build.artefacts.first())
            .ok_or_else(|| ProviderError::NoArtifact { handle: handle.short() })?;

        // Artefact URLs are pre-signed; the token header is still accepted
        // and kept for the unsigned fallback endpoints.
        Ok(ArtifactLocator::new(&artefact.url).with_auth("x-auth-token", &self.token))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Codemagic
    }
}
