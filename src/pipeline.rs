//! End-to-end pipeline driver
//!
//! One [`Pipeline`] instance owns everything a single build request needs:
//! the provider adapter, poller configuration, retriever, delivery chain,
//! notifier, stage log, and working directory. Instances share no mutable
//! state, so independent pipelines (two providers polled concurrently) are
//! just two instances. Execution within an instance is strictly sequential;
//! the only suspension points are the poll interval and the download stream.

use crate::artifact::{DownloadError, Retriever};
use crate::config::AirliftConfig;
use crate::deliver::DeliveryChain;
use crate::model::{ArtifactFile, BuildHandle, BuildTarget, DeliveryOutcome};
use crate::notify::Notifier;
use crate::poller::{PollError, Poller};
use crate::progress::ProgressReporter;
use crate::provider::{CiProvider, ProviderError};
use crate::stagelog::StageLog;
use crate::validate::{validate, ValidationError};
use thiserror::Error;
use tracing::info;

/// Fatal pipeline failures, each carrying enough context to report
///
/// `ManualRequired` is deliberately *not* here: the delivery chain always
/// terminates with an outcome, and the caller decides how to treat it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub struct Pipeline {
    provider: Box<dyn CiProvider>,
    chain: DeliveryChain,
    notifier: Box<dyn Notifier>,
    reporter: Box<dyn ProgressReporter>,
    retriever: Retriever,
    stage_log: StageLog,
    config: AirliftConfig,
}

impl Pipeline {
    pub fn new(
        provider: Box<dyn CiProvider>,
        chain: DeliveryChain,
        notifier: Box<dyn Notifier>,
        reporter: Box<dyn ProgressReporter>,
        config: AirliftConfig,
    ) -> Self {
        let stage_log = StageLog::new(&config.out_dir);
        Self {
            provider,
            chain,
            notifier,
            reporter,
            retriever: Retriever::new(),
            stage_log,
            config,
        }
    }

    /// Triggers a build and returns its handle
    pub async fn trigger(&self, target: &BuildTarget) -> Result<BuildHandle, PipelineError> {
        self.stage_log
            .append("trigger", &format!("triggering {}@{}", target.repo, target.git_ref));
        let handle = self.provider.trigger(target).await?;
        self.stage_log.append("trigger", &format!("started {}", handle));
        self.notifier.notify("trigger", &format!("Build started: {}", handle));
        Ok(handle)
    }

    /// Polls the build to a terminal state under the configured budget
    pub async fn await_build(&self, handle: &BuildHandle) -> Result<(), PipelineError> {
        self.stage_log.append("poll", &format!("polling {}", handle));
        let mut poller = Poller::new(self.provider.as_ref(), self.notifier.as_ref(), self.config.poll_config());

        let result = poller.poll(handle).await;
        match &result {
            Ok(status) => self.stage_log.append("poll", &format!("{} -> {}", handle, status)),
            Err(e) => self.stage_log.append("poll", &format!("{} -> {}", handle, e)),
        }
        result?;
        Ok(())
    }

    /// Resolves, downloads, unpacks, and validates the artifact of a
    /// succeeded build
    pub async fn fetch(&self, handle: &BuildHandle) -> Result<ArtifactFile, PipelineError> {
        // Locator construction is conditioned on a Succeeded poll; callers go
        // through await_build first.
        let locator = self.provider.resolve_artifact(handle).await?;
        self.stage_log.append("download", &format!("downloading {}", locator.url));
        self.notifier.notify("download", "Downloading build artifact");

        let artifact = self
            .retriever
            .retrieve(&locator, &self.config.out_dir, self.reporter.as_ref())
            .await?;
        self.stage_log
            .append("download", &format!("retrieved {}", artifact.path.display()));

        let report = validate(&artifact)?;
        if let Some(warning) = &report.warning {
            self.stage_log.append("validate", warning);
        }
        self.stage_log
            .append("validate", &format!("validated {}", artifact.path.display()));
        Ok(artifact)
    }

    /// Runs the delivery chain; always yields an outcome
    pub async fn deliver(&self, artifact: &ArtifactFile) -> DeliveryOutcome {
        self.notifier.notify("install", "Installing artifact");
        let outcome = self.chain.deliver(artifact, self.notifier.as_ref()).await;
        self.stage_log.append(
            "deliver",
            &format!("{:?} for {}", outcome_tag(&outcome), artifact.path.display()),
        );
        outcome
    }

    /// Whole pipeline: trigger, poll, fetch, deliver
    pub async fn run(&self, target: &BuildTarget) -> Result<DeliveryOutcome, PipelineError> {
        let handle = self.trigger(target).await?;
        self.await_build(&handle).await?;
        let artifact = self.fetch(&handle).await?;
        let outcome = self.deliver(&artifact).await;

        info!(
            outcome = ?outcome_tag(&outcome),
            artifact = %outcome.artifact().path.display(),
            "Pipeline finished"
        );
        Ok(outcome)
    }
}

fn outcome_tag(outcome: &DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::InstalledViaPrimary { .. } => "installed-via-primary",
        DeliveryOutcome::InstalledViaSecondary { .. } => "installed-via-secondary",
        DeliveryOutcome::ManualRequired { .. } => "manual-required",
    }
}
