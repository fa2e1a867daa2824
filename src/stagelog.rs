//! Append-only per-stage line logs
//!
//! Each pipeline instance owns its own [`StageLog`] rooted under its working
//! directory, so independent pipelines never write to the same files (the
//! original design of one process-wide log per stage made parallel runs
//! impossible to untangle). Lines are timestamp-prefixed and appended;
//! nothing is ever rewritten. Writes are best-effort and never abort the
//! pipeline.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct StageLog {
    dir: PathBuf,
}

impl StageLog {
    /// Log sink rooted at `<base>/logs/`
    pub fn new(base: &Path) -> Self {
        Self {
            dir: base.join("logs"),
        }
    }

    /// Appends a timestamped line to the given stage's log file
    pub fn append(&self, stage: &str, message: &str) {
        if let Err(e) = self.try_append(stage, message) {
            warn!(stage, error = %e, "Stage log write failed");
        }
    }

    fn try_append(&self, stage: &str, message: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(format!("{}.log", stage)))?;
        writeln!(file, "{} {}", Utc::now().to_rfc3339(), message)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lines_are_appended_with_timestamps() {
        let tmp = TempDir::new().unwrap();
        let log = StageLog::new(tmp.path());

        log.append("poll", "started");
        log.append("poll", "build succeeded");

        let content = std::fs::read_to_string(tmp.path().join("logs/poll.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("started"));
        assert!(lines[1].ends_with("build succeeded"));
        // RFC 3339 prefix parses back as a timestamp
        let ts = lines[0].split_whitespace().next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_stages_get_separate_files() {
        let tmp = TempDir::new().unwrap();
        let log = StageLog::new(tmp.path());

        log.append("poll", "a");
        log.append("download", "b");

        assert!(tmp.path().join("logs/poll.log").exists());
        assert!(tmp.path().join("logs/download.log").exists());
    }

    #[test]
    fn test_unwritable_dir_does_not_panic() {
        let log = StageLog::new(Path::new("/proc/definitely-not-writable"));
        log.append("poll", "dropped");
    }
}
