//! Download progress reporting

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Observer for monotonic download progress
///
/// `update` is called with bytes received so far against the declared total
/// (when the server sent a content-length). Implementations must be cheap and
/// must never fail; progress is observability only and never gates the
/// download.
pub trait ProgressReporter: Send + Sync {
    /// Download started; `total` is the declared content-length, if any
    fn start(&self, total: Option<u64>);

    /// Bytes received so far (monotonically non-decreasing)
    fn update(&self, received: u64);

    /// Download finished (success or failure)
    fn finish(&self);
}

/// Ignores all progress events
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn start(&self, _total: Option<u64>) {}
    fn update(&self, _received: u64) {}
    fn finish(&self) {}
}

/// Terminal progress bar
pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self { bar: Mutex::new(None) }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn start(&self, total: Option<u64>) {
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn update(&self, received: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(received);
            }
        }
    }

    fn finish(&self) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.finish_and_clear();
            }
        }
    }
}
