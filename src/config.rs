//! Configuration management for airlift
//!
//! Settings load from environment variables with sensible defaults; CLI flags
//! override them. Provider credentials are *not* held here: each adapter
//! reads its own credential variables once at construction.
//!
//! # Environment Variables
//!
//! - `AIRLIFT_PROVIDER`: provider selection (github|codemagic|expo)
//! - `AIRLIFT_TIMEOUT`: poll timeout budget in seconds - default: "1800"
//! - `AIRLIFT_POLL_INTERVAL`: seconds between status queries - default: "30"
//! - `AIRLIFT_OUT_DIR`: download destination - default: system temp dir + "airlift"
//! - `AIRLIFT_LOG_LEVEL`: logging level - default: "info"
//!
//! ## Provider credentials (read by the adapters)
//! - **GitHub**: `GITHUB_TOKEN` (required), `AIRLIFT_GITHUB_WORKFLOW` (optional)
//! - **Codemagic**: `CODEMAGIC_API_TOKEN` (required), `AIRLIFT_CODEMAGIC_WORKFLOW` (optional)
//! - **Expo**: `EXPO_TOKEN` (optional; the `eas` CLI login is also honored)

use crate::model::ProviderKind;
use crate::poller::{PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Provider not specified. Set AIRLIFT_PROVIDER or pass --ci (github|codemagic|expo)")]
    MissingProvider,

    #[error("Invalid provider: {0}. Valid options: github, codemagic, expo")]
    InvalidProvider(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Runtime configuration for one pipeline invocation
///
/// Behavior flags (`--auto-install`, `--no-notify`, `--force-secondary`) are
/// not carried here; the handlers wire them directly into the components
/// they affect.
#[derive(Debug, Clone)]
pub struct AirliftConfig {
    pub provider: ProviderKind,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    pub out_dir: PathBuf,
}

impl AirliftConfig {
    /// Loads configuration from the environment
    ///
    /// `provider_override` comes from `--ci` and wins over `AIRLIFT_PROVIDER`.
    pub fn from_env(provider_override: Option<ProviderKind>) -> Result<Self, ConfigError> {
        let provider = match provider_override {
            Some(kind) => kind,
            None => {
                let raw = env::var("AIRLIFT_PROVIDER").map_err(|_| ConfigError::MissingProvider)?;
                ProviderKind::from_lower_str(&raw.to_lowercase())
                    .ok_or(ConfigError::InvalidProvider(raw))?
            }
        };

        Ok(Self {
            provider,
            poll_timeout: parse_secs("AIRLIFT_TIMEOUT", DEFAULT_POLL_TIMEOUT)?,
            poll_interval: parse_secs("AIRLIFT_POLL_INTERVAL", DEFAULT_POLL_INTERVAL)?,
            out_dir: env::var("AIRLIFT_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("airlift")),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
            timeout: self.poll_timeout,
        }
    }
}

fn parse_secs(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::ParseError {
                field: var.to_string(),
                error: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in ["AIRLIFT_PROVIDER", "AIRLIFT_TIMEOUT", "AIRLIFT_POLL_INTERVAL", "AIRLIFT_OUT_DIR"] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        env::set_var("AIRLIFT_PROVIDER", "github");

        let config = AirliftConfig::from_env(None).unwrap();
        assert_eq!(config.provider, ProviderKind::Github);
        assert_eq!(config.poll_timeout, Duration::from_secs(1800));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_missing_provider_is_an_error() {
        clear_env();
        assert!(matches!(
            AirliftConfig::from_env(None),
            Err(ConfigError::MissingProvider)
        ));
    }

    #[test]
    #[serial]
    fn test_invalid_provider_is_reported() {
        clear_env();
        env::set_var("AIRLIFT_PROVIDER", "jenkins");
        match AirliftConfig::from_env(None) {
            Err(ConfigError::InvalidProvider(name)) => assert_eq!(name, "jenkins"),
            other => panic!("Expected InvalidProvider, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[serial]
    fn test_cli_override_wins() {
        clear_env();
        env::set_var("AIRLIFT_PROVIDER", "github");
        let config = AirliftConfig::from_env(Some(ProviderKind::Expo)).unwrap();
        assert_eq!(config.provider, ProviderKind::Expo);
    }

    #[test]
    #[serial]
    fn test_timeout_parsing() {
        clear_env();
        env::set_var("AIRLIFT_PROVIDER", "codemagic");
        env::set_var("AIRLIFT_TIMEOUT", "60");

        let config = AirliftConfig::from_env(None).unwrap();
        assert_eq!(config.poll_timeout, Duration::from_secs(60));

        env::set_var("AIRLIFT_TIMEOUT", "not-a-number");
        assert!(matches!(
            AirliftConfig::from_env(None),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
