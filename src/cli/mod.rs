pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, DeliverArgs, DownloadArgs, PollArgs, RunArgs, TriggerArgs};
