//! Subcommand handlers
//!
//! Each handler returns the process exit code: 0 on full success, 1 on any
//! unrecovered failure. Manual fallback counts as a failure exit (the caller
//! may still treat it as partial success since the artifact exists and its
//! path was printed).

use super::commands::{DeliverArgs, DownloadArgs, HandleArgs, PollArgs, RunArgs, TriggerArgs};
use crate::config::AirliftConfig;
use crate::deliver::DeliveryChain;
use crate::model::{ArtifactFile, BuildHandle, BuildTarget, DeliveryOutcome, ProviderKind};
use crate::notify::{ConsoleNotifier, DesktopNotifier, Notifier, NullNotifier};
use crate::pipeline::Pipeline;
use crate::progress::{BarReporter, NullReporter, ProgressReporter};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::error;

pub async fn handle_trigger(args: &TriggerArgs) -> i32 {
    run_fallible(async {
        let config = load_config(args.ci, None, None)?;
        let pipeline = make_pipeline(&config, false, false)?;

        let target = target_from(&args.repo, &args.git_ref, args.platform.as_deref());
        let handle = pipeline.trigger(&target).await?;

        // The handle is this command's product; print it as JSON for the
        // later poll/download invocations.
        println!("{}", serde_json::to_string(&handle)?);
        Ok(ExitOutcome::Success)
    })
    .await
}

pub async fn handle_poll(args: &PollArgs) -> i32 {
    run_fallible(async {
        let mut config = load_config(args.handle.ci, args.timeout, None)?;
        let handle = resolve_handle(&args.handle, &mut config)?;
        let pipeline = make_pipeline(&config, false, args.no_notify)?;

        pipeline.await_build(&handle).await?;

        println!("Build {} succeeded", handle);
        Ok(ExitOutcome::Success)
    })
    .await
}

pub async fn handle_download(args: &DownloadArgs) -> i32 {
    run_fallible(async {
        let mut config = load_config(args.handle.ci, None, args.out.clone())?;
        let handle = resolve_handle(&args.handle, &mut config)?;
        let pipeline = make_pipeline(&config, args.force_secondary, args.no_notify)?;

        // Download presumes the build already reached Succeeded; resolving
        // the locator fails cleanly otherwise.
        let artifact = pipeline.fetch(&handle).await?;

        if args.auto_install {
            let outcome = pipeline.deliver(&artifact).await;
            print_outcome(&outcome);
            return Ok(ExitOutcome::from(&outcome));
        }

        println!("Artifact ready: {}", artifact.path.display());
        Ok(ExitOutcome::Success)
    })
    .await
}

pub async fn handle_deliver(args: &DeliverArgs) -> i32 {
    run_fallible(async {
        let artifact = local_artifact(&args.file)?;
        let chain = DeliveryChain::standard().force_secondary(args.force_secondary);
        let notifier = make_notifier(args.no_notify);

        let outcome = chain.deliver(&artifact, notifier.as_ref()).await;
        print_outcome(&outcome);
        Ok(ExitOutcome::from(&outcome))
    })
    .await
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    run_fallible(async {
        let config = load_config(args.ci, args.timeout, args.out.clone())?;
        let pipeline = make_pipeline(&config, args.force_secondary, args.no_notify)?;

        let target = target_from(&args.repo, &args.git_ref, args.platform.as_deref());
        let outcome = pipeline.run(&target).await?;
        print_outcome(&outcome);
        Ok(ExitOutcome::from(&outcome))
    })
    .await
}

enum ExitOutcome {
    Success,
    ManualRequired,
}

impl From<&DeliveryOutcome> for ExitOutcome {
    fn from(outcome: &DeliveryOutcome) -> Self {
        if outcome.is_installed() {
            ExitOutcome::Success
        } else {
            ExitOutcome::ManualRequired
        }
    }
}

async fn run_fallible<F>(fut: F) -> i32
where
    F: std::future::Future<Output = Result<ExitOutcome>>,
{
    match fut.await {
        Ok(ExitOutcome::Success) => 0,
        Ok(ExitOutcome::ManualRequired) => 1,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn load_config(ci: Option<ProviderKind>, timeout: Option<u64>, out: Option<PathBuf>) -> Result<AirliftConfig> {
    let mut config = AirliftConfig::from_env(ci)?;
    if let Some(secs) = timeout {
        config.poll_timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(dir) = out {
        config.out_dir = dir;
    }
    Ok(config)
}

fn make_pipeline(config: &AirliftConfig, force_secondary: bool, no_notify: bool) -> Result<Pipeline> {
    let provider = crate::provider::create_provider(config.provider)?;
    let chain = DeliveryChain::standard().force_secondary(force_secondary);
    let reporter: Box<dyn ProgressReporter> = if no_notify {
        Box::new(NullReporter)
    } else {
        Box::new(BarReporter::new())
    };

    Ok(Pipeline::new(provider, chain, make_notifier(no_notify), reporter, config.clone()))
}

fn make_notifier(no_notify: bool) -> Box<dyn Notifier> {
    if no_notify {
        return Box::new(NullNotifier);
    }
    match std::env::var("AIRLIFT_NOTIFY").as_deref() {
        Ok("desktop") => Box::new(DesktopNotifier::new("airlift")),
        _ => Box::new(ConsoleNotifier),
    }
}

fn target_from(repo: &str, git_ref: &str, platform: Option<&str>) -> BuildTarget {
    let mut target = BuildTarget::new(repo, git_ref);
    if let Some(platform) = platform {
        target = target.with_platform(platform);
    }
    target
}

/// Builds the handle and aligns the config's provider with it, so the
/// adapter constructed later matches the handle's shape (a `--handle` JSON
/// naming a different provider would otherwise be polled by the wrong one)
fn resolve_handle(args: &HandleArgs, config: &mut AirliftConfig) -> Result<BuildHandle> {
    let handle = handle_from(args, config.provider)?;
    config.provider = handle.provider;
    Ok(handle)
}

/// Builds a handle from `--handle` JSON or the individual flags
fn handle_from(args: &HandleArgs, provider: ProviderKind) -> Result<BuildHandle> {
    if let Some(json) = &args.handle {
        return serde_json::from_str(json).context("invalid --handle JSON");
    }

    if let Some(run_id) = &args.run_id {
        let repo = args
            .repo
            .as_deref()
            .context("--run-id requires --repo to identify the repository")?;
        return Ok(BuildHandle::for_run(provider, repo, run_id));
    }

    if let Some(build_id) = &args.build_id {
        return Ok(BuildHandle::for_build(provider, build_id));
    }

    bail!("no build identified: pass --run-id with --repo, --build-id, or --handle")
}

/// Wraps a local path as an artifact for the standalone deliver command
fn local_artifact(path: &PathBuf) -> Result<ArtifactFile> {
    let metadata = std::fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;

    if metadata.is_dir() {
        return Ok(ArtifactFile::unpacked_dir(path.clone()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_lowercase();
    Ok(ArtifactFile::package(path.clone(), metadata.len(), ext))
}

fn print_outcome(outcome: &DeliveryOutcome) {
    let artifact = outcome.artifact();
    // Final line always states the concrete outcome and artifact path.
    match outcome {
        DeliveryOutcome::InstalledViaPrimary { .. } => {
            println!("Installed via system installer: {}", artifact.path.display())
        }
        DeliveryOutcome::InstalledViaSecondary { .. } => {
            println!("Installed via device bridge: {}", artifact.path.display())
        }
        DeliveryOutcome::ManualRequired { .. } => {
            println!("Manual installation required; artifact at: {}", artifact.path.display())
        }
    }
}
