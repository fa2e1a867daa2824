//! CI provider abstraction layer
//!
//! This module provides the core trait and types for talking to the supported
//! CI backends (GitHub Actions, Codemagic, Expo EAS). All backends implement
//! the [`CiProvider`] trait so the poller and pipeline never see a concrete
//! provider type.

pub mod codemagic;
pub mod expo;
pub mod github;

use crate::model::{ArtifactLocator, BuildHandle, BuildStatus, BuildTarget, ProviderKind};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required external CLI tool is not installed or not on PATH
    #[error("required tool '{tool}' is unavailable: {message}")]
    ToolUnavailable { tool: String, message: String },

    /// A required credential environment variable is missing
    #[error("missing credential: set {var} for provider {provider}")]
    MissingCredential { provider: ProviderKind, var: &'static str },

    /// The backend rejected the trigger request (auth, malformed target)
    #[error("trigger rejected by {provider}: {message}")]
    Trigger { provider: ProviderKind, message: String },

    /// A status query failed for a recoverable reason (network, parse).
    /// The caller decides whether to retry; a stale status is never returned.
    #[error("transient query failure for {handle}: {message}")]
    TransientQuery { handle: String, message: String },

    /// The handle's shape does not fit this adapter (e.g. a build-id handle
    /// given to a run-id provider). Fatal: retrying cannot fix it.
    #[error("handle {handle} does not fit this provider: {message}")]
    InvalidHandle { handle: String, message: String },

    /// The backend reports a successful build but no artifact exists
    #[error("build {handle} succeeded but produced no artifact")]
    NoArtifact { handle: String },
}

impl ProviderError {
    pub(crate) fn transient(handle: &BuildHandle, message: impl Into<String>) -> Self {
        ProviderError::TransientQuery {
            handle: handle.short(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_handle(handle: &BuildHandle, message: impl Into<String>) -> Self {
        ProviderError::InvalidHandle {
            handle: handle.short(),
            message: message.into(),
        }
    }

    /// Transient errors are retried by the poll loop; everything else is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::TransientQuery { .. })
    }
}

/// Core trait every CI backend adapter implements
///
/// # Contract
///
/// - `trigger` initiates a build and returns an opaque [`BuildHandle`].
/// - `query_status` is a single best-effort read; it never caches and never
///   returns a stale status. Re-querying a terminal handle returns the same
///   terminal status.
/// - `resolve_artifact` is only valid after a `Succeeded` status and fails
///   with [`ProviderError::NoArtifact`] when the backend reports success but
///   has nothing to download.
///
/// Each call may issue a network request or spawn a subprocess; adapters keep
/// no local state beyond credentials captured at construction.
#[async_trait]
pub trait CiProvider: Send + Sync {
    /// Initiates a build for the given target
    async fn trigger(&self, target: &BuildTarget) -> Result<BuildHandle, ProviderError>;

    /// Reads the current build status, exactly once
    async fn query_status(&self, handle: &BuildHandle) -> Result<BuildStatus, ProviderError>;

    /// Resolves the download locator for a succeeded build
    async fn resolve_artifact(&self, handle: &BuildHandle) -> Result<ArtifactLocator, ProviderError>;

    /// Provider tag this adapter serves
    fn kind(&self) -> ProviderKind;
}

/// Constructs the adapter for a provider tag, reading its credentials from
/// the environment once
///
/// Missing credentials surface as [`ProviderError::MissingCredential`], never
/// a panic.
pub fn create_provider(kind: ProviderKind) -> Result<Box<dyn CiProvider>, ProviderError> {
    match kind {
        ProviderKind::Github => Ok(Box::new(github::GithubActions::from_env()?)),
        ProviderKind::Codemagic => Ok(Box::new(codemagic::Codemagic::from_env()?)),
        ProviderKind::Expo => Ok(Box::new(expo::ExpoEas::from_env())),
    }
}
