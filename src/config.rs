//! Application configuration
//!
//! TOML-backed settings with usable defaults; the binaries run without a
//! config file at all.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_RELAY_PORT, DEFAULT_TOPIC};
use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub session: SessionConfig,
}

/// Relay connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay address, host:port
    pub address: String,
    /// Broadcast topic
    pub topic: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_RELAY_PORT}"),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

/// Session timing and output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long the sender captures before stopping
    pub send_duration_secs: u64,
    /// How long the receiver listens before the controller cancels it
    pub receive_duration_secs: u64,
    /// Where the receiver writes its reconstructed stream
    pub output_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_duration_secs: 10,
            receive_duration_secs: 30,
            output_path: PathBuf::from("received.wav"),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.relay.topic, "convo");
        assert_eq!(config.session.send_duration_secs, 10);
    }

    #[test]
    fn test_partial_file_overrides() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [relay]
            address = "10.0.0.5:9000"

            [session]
            send_duration_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.relay.address, "10.0.0.5:9000");
        assert_eq!(parsed.relay.topic, "convo");
        assert_eq!(parsed.session.send_duration_secs, 3);
        assert_eq!(parsed.session.receive_duration_secs, 30);
    }
}
