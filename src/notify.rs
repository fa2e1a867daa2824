//! Human-facing progress notifications
//!
//! A [`Notifier`] is a best-effort side channel: implementations never return
//! errors to callers and never gate control flow. The pipeline tells it about
//! major state transitions (polling started, build complete, downloading,
//! installing, final outcome).

use std::process::Command;
use tracing::{debug, warn};

/// Best-effort sink for human-facing progress messages
pub trait Notifier: Send + Sync {
    /// Delivers a message for the given pipeline stage. Must not block on
    /// user interaction and must swallow delivery failures.
    fn notify(&self, stage: &str, message: &str);
}

/// Writes notifications as stderr lines
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, stage: &str, message: &str) {
        eprintln!("[{}] {}", stage, message);
    }
}

/// Drops all notifications (`--no-notify`)
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _stage: &str, _message: &str) {}
}

/// Sends desktop notifications through whichever notifier tool the host has,
/// falling back to stderr when none is found
///
/// Delivery failures are logged at warn level and otherwise ignored.
pub struct DesktopNotifier {
    title: String,
}

impl DesktopNotifier {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    fn try_send(&self, message: &str) -> bool {
        // Linux desktops
        if run_quiet(Command::new("notify-send").arg(&self.title).arg(message)) {
            return true;
        }
        // macOS with terminal-notifier installed
        if run_quiet(
            Command::new("terminal-notifier")
                .args(["-title", &self.title, "-message", message]),
        ) {
            return true;
        }
        // Stock macOS
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            message.replace('"', "'"),
            self.title.replace('"', "'")
        );
        run_quiet(Command::new("osascript").args(["-e", &script]))
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, stage: &str, message: &str) {
        if !self.try_send(message) {
            debug!(stage, "No desktop notifier available, falling back to stderr");
            eprintln!("[{}] {}", stage, message);
        }
    }
}

fn run_quiet(cmd: &mut Command) -> bool {
    match cmd.output() {
        Ok(output) => output.status.success(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "Notifier command failed");
            }
            false
        }
    }
}
