use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::ProviderKind;

/// Remote CI build pipeline: trigger, poll, fetch and install build artifacts
#[derive(Parser, Debug)]
#[command(
    name = "airlift",
    about = "Turn a remote CI build into an installed artifact on a device",
    version,
    long_about = "airlift triggers a build on a CI backend (GitHub Actions, Codemagic, \
                  Expo EAS), polls it to completion under a time budget, downloads and \
                  unpacks the artifact, validates it, and installs it through an ordered \
                  chain of delivery methods with a manual fallback."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Increase verbosity")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Trigger a remote build and print its handle",
        long_about = "Triggers a build and prints the resulting build handle as JSON.\n\n\
                      Examples:\n  \
                      airlift trigger --ci github --repo owner/app --ref main\n  \
                      airlift trigger --ci codemagic --repo <app-id> --ref develop --platform android"
    )]
    Trigger(TriggerArgs),

    #[command(
        about = "Poll an existing build until it reaches a terminal state",
        long_about = "Examples:\n  \
                      airlift poll --ci github --repo owner/app --run-id 42\n  \
                      airlift poll --ci codemagic --build-id abc123 --timeout 600"
    )]
    Poll(PollArgs),

    #[command(
        about = "Download, unpack and validate a finished build's artifact",
        long_about = "Examples:\n  \
                      airlift download --ci github --repo owner/app --run-id 42 --out ./builds\n  \
                      airlift download --ci expo --build-id abc123 --auto-install"
    )]
    Download(DownloadArgs),

    #[command(
        about = "Install a local artifact through the delivery chain",
        long_about = "Examples:\n  \
                      airlift deliver --file ./builds/payload.apk\n  \
                      airlift deliver --file ./builds/payload.apk --force-secondary"
    )]
    Deliver(DeliverArgs),

    #[command(
        about = "Run the whole pipeline: trigger, poll, download, install",
        long_about = "Examples:\n  \
                      airlift run --ci github --repo owner/app --ref main --out ./builds"
    )]
    Run(RunArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct TriggerArgs {
    #[arg(long = "ci", value_parser = parse_provider_kind, help = "CI provider (github|codemagic|expo)")]
    pub ci: Option<ProviderKind>,

    #[arg(long, help = "Repository (owner/name), app id, or project directory")]
    pub repo: String,

    #[arg(long = "ref", default_value = "main", help = "Branch or ref to build")]
    pub git_ref: String,

    #[arg(long, help = "Target platform hint (e.g. android, ios)")]
    pub platform: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct HandleArgs {
    #[arg(long = "ci", value_parser = parse_provider_kind, help = "CI provider (github|codemagic|expo)")]
    pub ci: Option<ProviderKind>,

    #[arg(long, help = "Repository the run belongs to (run-id handles)")]
    pub repo: Option<String>,

    #[arg(long, help = "Workflow run identifier")]
    pub run_id: Option<String>,

    #[arg(long, conflicts_with = "run_id", help = "Build identifier")]
    pub build_id: Option<String>,

    #[arg(long, help = "Full build handle as JSON (overrides the other handle flags)")]
    pub handle: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct PollArgs {
    #[command(flatten)]
    pub handle: HandleArgs,

    #[arg(long, value_name = "SECONDS", help = "Timeout budget (default 1800)")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Suppress progress notifications")]
    pub no_notify: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub handle: HandleArgs,

    #[arg(short = 'o', long, value_name = "DIR", help = "Download destination directory")]
    pub out: Option<PathBuf>,

    #[arg(long, help = "Install the artifact after downloading")]
    pub auto_install: bool,

    #[arg(long, help = "Suppress progress notifications")]
    pub no_notify: bool,

    #[arg(long, help = "Skip the system installer, go straight to the device bridge")]
    pub force_secondary: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeliverArgs {
    #[arg(long, value_name = "FILE", help = "Artifact file or directory to install")]
    pub file: PathBuf,

    #[arg(long, help = "Suppress progress notifications")]
    pub no_notify: bool,

    #[arg(long, help = "Skip the system installer, go straight to the device bridge")]
    pub force_secondary: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(long = "ci", value_parser = parse_provider_kind, help = "CI provider (github|codemagic|expo)")]
    pub ci: Option<ProviderKind>,

    #[arg(long, help = "Repository (owner/name), app id, or project directory")]
    pub repo: String,

    #[arg(long = "ref", default_value = "main", help = "Branch or ref to build")]
    pub git_ref: String,

    #[arg(long, help = "Target platform hint (e.g. android, ios)")]
    pub platform: Option<String>,

    #[arg(short = 'o', long, value_name = "DIR", help = "Download destination directory")]
    pub out: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", help = "Timeout budget (default 1800)")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Suppress progress notifications")]
    pub no_notify: bool,

    #[arg(long, help = "Skip the system installer, go straight to the device bridge")]
    pub force_secondary: bool,
}

fn parse_provider_kind(s: &str) -> Result<ProviderKind, String> {
    ProviderKind::from_lower_str(&s.to_lowercase())
        .ok_or_else(|| format!("Invalid provider: {}. Valid options: github, codemagic, expo", s))
}
