//! Bounded-time build status polling
//!
//! The poller drives a fixed-interval status loop against a [`CiProvider`]
//! until the build reaches a terminal state or the timeout budget runs out.
//! A single budget (not a retry counter) is the sole backstop: transient
//! query errors are logged and absorbed, each costing one interval, so
//! behavior stays predictable regardless of interval tuning. For a budget `T`
//! and interval `I` at most `ceil(T / I)` status queries are made.

use crate::model::{BuildHandle, BuildStatus};
use crate::notify::Notifier;
use crate::provider::{CiProvider, ProviderError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default interval between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default overall timeout budget
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Poller state, visible for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

/// Terminal poll failures
#[derive(Debug, Error)]
pub enum PollError {
    /// Backend reported the build failed; non-retryable
    #[error("build {handle} failed (backend reported: {status})")]
    BuildFailed { handle: String, status: BuildStatus },

    /// Backend reported the build was canceled; non-retryable
    #[error("build {handle} was canceled")]
    BuildCanceled { handle: String },

    /// Budget exhausted while the build was still non-terminal
    #[error("build {handle} did not finish within {budget_secs}s ({queries} status queries)")]
    TimedOut {
        handle: String,
        budget_secs: u64,
        queries: u32,
    },

    /// A non-transient provider failure during the loop
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            ..Self::default()
        }
    }
}

/// Drives the status loop for one build
///
/// Owns its own clock and counters; independent pipelines use independent
/// pollers and never share state.
pub struct Poller<'a> {
    provider: &'a dyn CiProvider,
    notifier: &'a dyn Notifier,
    config: PollConfig,
    state: PollState,
    queries: u32,
    transient_failures: u32,
    max_consecutive_transient: u32,
}

impl<'a> Poller<'a> {
    pub fn new(provider: &'a dyn CiProvider, notifier: &'a dyn Notifier, config: PollConfig) -> Self {
        Self {
            provider,
            notifier,
            config,
            state: PollState::Idle,
            queries: 0,
            transient_failures: 0,
            max_consecutive_transient: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Status queries made so far
    pub fn queries(&self) -> u32 {
        self.queries
    }

    /// Longest run of consecutive transient query failures seen.
    /// Observability only; a persistently broken adapter still surfaces as a
    /// timeout, but this counter makes it diagnosable.
    pub fn transient_failures(&self) -> u32 {
        self.max_consecutive_transient
    }

    /// Polls until the build reaches a terminal state or the budget expires
    ///
    /// On success returns the terminal `Succeeded` status; the caller may then
    /// resolve the artifact locator. `Failed`/`Canceled` and timeout are
    /// distinct [`PollError`] variants so callers can tell them apart.
    pub async fn poll(&mut self, handle: &BuildHandle) -> Result<BuildStatus, PollError> {
        let started = Instant::now();
        self.state = PollState::Polling;
        self.notifier.notify(
            "poll",
            &format!(
                "Waiting for build {} (up to {}s, checking every {}s)",
                handle,
                self.config.timeout.as_secs(),
                self.config.interval.as_secs()
            ),
        );

        while started.elapsed() < self.config.timeout {
            self.queries += 1;
            match self.provider.query_status(handle).await {
                Ok(status) => {
                    self.transient_failures = 0;
                    debug!(handle = %handle, %status, query = self.queries, "Poll result");

                    match status {
                        BuildStatus::Succeeded => {
                            self.state = PollState::Succeeded;
                            info!(handle = %handle, queries = self.queries, "Build succeeded");
                            self.notifier.notify("poll", &format!("Build {} succeeded", handle));
                            return Ok(status);
                        }
                        BuildStatus::Failed => {
                            self.state = PollState::Failed;
                            self.notifier.notify("poll", &format!("Build {} failed", handle));
                            return Err(PollError::BuildFailed {
                                handle: handle.short(),
                                status,
                            });
                        }
                        BuildStatus::Canceled => {
                            self.state = PollState::Failed;
                            self.notifier.notify("poll", &format!("Build {} was canceled", handle));
                            return Err(PollError::BuildCanceled { handle: handle.short() });
                        }
                        // Pending / Running / Unknown: still in flight
                        _ => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    // State does not change; the interval elapses and the loop
                    // retries under the same overall budget.
                    self.transient_failures += 1;
                    self.max_consecutive_transient = self.max_consecutive_transient.max(self.transient_failures);
                    warn!(
                        handle = %handle,
                        error = %e,
                        consecutive = self.transient_failures,
                        "Transient status query failure, will retry"
                    );
                }
                Err(e) => {
                    self.state = PollState::Failed;
                    return Err(PollError::Provider(e));
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }

        self.state = PollState::TimedOut;
        self.notifier.notify(
            "poll",
            &format!("Gave up waiting for build {} after {}s", handle, self.config.timeout.as_secs()),
        );
        Err(PollError::TimedOut {
            handle: handle.short(),
            budget_secs: self.config.timeout.as_secs(),
            queries: self.queries,
        })
    }
}
