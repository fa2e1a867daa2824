//! Ordered installation delivery chain
//!
//! Methods run strictly in priority order; each either succeeds, fails
//! (advance to the next), or is skipped because its host capability is
//! absent. A failed method is never retried. The chain always terminates:
//! the manual fallback cannot fail and yields `ManualRequired` with
//! actionable instructions.

use crate::model::{ArtifactFile, DeliveryOutcome};
use crate::notify::Notifier;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A single installation method failed; the chain advances, the pipeline
/// does not fail.
#[derive(Debug, Error)]
#[error("install method '{method}' failed: {message}")]
pub struct InstallError {
    pub method: String,
    pub message: String,
}

impl InstallError {
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// One strategy for getting an artifact onto the device
#[async_trait]
pub trait InstallMethod: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the host capability this method needs is present.
    /// An unavailable method is skipped, not failed.
    async fn available(&self) -> bool;

    async fn install(&self, artifact: &ArtifactFile) -> Result<(), InstallError>;
}

/// Method 1: hand the artifact to the platform's package-install intent
///
/// "Succeeded" means the handoff call was accepted; the chain does not wait
/// for the user to finish with the system installer.
pub struct SystemOpener;

impl SystemOpener {
    fn opener() -> Option<&'static str> {
        for candidate in ["termux-open", "xdg-open", "open"] {
            if which(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl InstallMethod for SystemOpener {
    fn name(&self) -> &str {
        "system-installer"
    }

    async fn available(&self) -> bool {
        Self::opener().is_some()
    }

    async fn install(&self, artifact: &ArtifactFile) -> Result<(), InstallError> {
        let opener = Self::opener().ok_or_else(|| InstallError::new(self.name(), "no opener tool found"))?;

        let output = Command::new(opener)
            .arg(&artifact.path)
            .output()
            .await
            .map_err(|e| InstallError::new(self.name(), e.to_string()))?;

        if output.status.success() {
            info!(opener, path = %artifact.path.display(), "Handed artifact to system installer");
            Ok(())
        } else {
            Err(InstallError::new(
                self.name(),
                format!(
                    "{} exited with {}: {}",
                    opener,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

/// Method 2: direct install over the device bridge (`adb`)
///
/// Skips fast when no authorized device is connected; a failed install is not
/// retried, the chain moves on to the manual fallback.
pub struct DeviceBridge;

impl DeviceBridge {
    async fn authorized_device_present() -> bool {
        let output = match Command::new("adb").arg("devices").output().await {
            Ok(output) => output,
            Err(_) => return false,
        };
        if !output.status.success() {
            return false;
        }
        // `adb devices` lists "<serial>\tdevice" for authorized devices;
        // unauthorized ones show "unauthorized".
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .skip(1)
            .any(|line| line.trim_end().ends_with("\tdevice") || line.trim_end().ends_with(" device"))
    }
}

#[async_trait]
impl InstallMethod for DeviceBridge {
    fn name(&self) -> &str {
        "device-bridge"
    }

    async fn available(&self) -> bool {
        which("adb") && Self::authorized_device_present().await
    }

    async fn install(&self, artifact: &ArtifactFile) -> Result<(), InstallError> {
        // -r: reinstall, keeping app data
        let output = Command::new("adb")
            .arg("install")
            .arg("-r")
            .arg(&artifact.path)
            .output()
            .await
            .map_err(|e| InstallError::new(self.name(), e.to_string()))?;

        if output.status.success() {
            info!(path = %artifact.path.display(), "Installed via device bridge");
            Ok(())
        } else {
            Err(InstallError::new(
                self.name(),
                format!(
                    "adb install exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

/// The ordered chain itself
pub struct DeliveryChain {
    methods: Vec<Box<dyn InstallMethod>>,
    force_secondary: bool,
}

impl DeliveryChain {
    /// Standard chain: system-installer handoff, then device bridge
    pub fn standard() -> Self {
        Self::with_methods(vec![Box::new(SystemOpener), Box::new(DeviceBridge)])
    }

    /// Chain over caller-supplied methods (tests inject fakes here)
    pub fn with_methods(methods: Vec<Box<dyn InstallMethod>>) -> Self {
        Self {
            methods,
            force_secondary: false,
        }
    }

    /// Skip directly to the secondary method
    pub fn force_secondary(mut self, force: bool) -> Self {
        self.force_secondary = force;
        self
    }

    /// Runs the chain; always terminates with an outcome, never an error
    pub async fn deliver(&self, artifact: &ArtifactFile, notifier: &dyn Notifier) -> DeliveryOutcome {
        // Whichever method ends up running needs to read the file.
        normalize_permissions(&artifact.path);

        for (index, method) in self.methods.iter().enumerate() {
            if self.force_secondary && index == 0 {
                debug!(method = method.name(), "Skipping primary method (forced secondary)");
                continue;
            }

            if !method.available().await {
                info!(method = method.name(), "Install method unavailable, skipping");
                continue;
            }

            notifier.notify("install", &format!("Installing via {}", method.name()));
            match method.install(artifact).await {
                Ok(()) => {
                    notifier.notify("install", &format!("Installed via {}", method.name()));
                    return if index == 0 {
                        DeliveryOutcome::InstalledViaPrimary {
                            artifact: artifact.clone(),
                        }
                    } else {
                        DeliveryOutcome::InstalledViaSecondary {
                            artifact: artifact.clone(),
                        }
                    };
                }
                Err(e) => {
                    // Advance, never retry.
                    warn!(method = method.name(), error = %e, "Install method failed, trying next");
                }
            }
        }

        let instructions = manual_instructions(artifact);
        notifier.notify("install", &instructions);
        info!(path = %artifact.path.display(), "Manual installation required");
        DeliveryOutcome::ManualRequired {
            artifact: artifact.clone(),
        }
    }
}

/// Human-readable fallback instructions referencing the artifact path
pub fn manual_instructions(artifact: &ArtifactFile) -> String {
    let path = artifact.path.display();
    if artifact.is_directory_fallback() {
        format!(
            "Automatic installation was not possible.\n\
             The build artifact was unpacked to:\n  {}\n\
             No installable package was identified inside; inspect the \
             directory and install the appropriate file manually.",
            path
        )
    } else {
        format!(
            "Automatic installation was not possible.\n\
             The build artifact is at:\n  {}\n\
             Transfer it to the device (USB, cloud drive, or 'adb install -r {}') \
             and open it to install.",
            path, path
        )
    }
}

fn which(tool: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(tool).is_file()))
        .unwrap_or(false)
}

fn normalize_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if path.is_dir() { 0o755 } else { 0o644 };
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
            warn!(path = %path.display(), error = %e, "Could not normalize artifact permissions");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
