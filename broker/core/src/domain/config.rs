// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Broker Node Configuration
//
// YAML-backed settings for one broker process:
// - HTTP control-plane bind address
// - fan-out/fan-in channel bind addresses
// - default collect windows for dispatch and poll calls

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// HTTP control-plane bind settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Agent channel bind settings.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Default collect windows, overridable per call via query parameters.
    #[serde(default)]
    pub windows: WindowsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Address agents connect to for receiving broadcast commands.
    #[serde(default = "default_fanout_bind")]
    pub fanout_bind: String,

    /// Address agents connect to for reporting responses.
    #[serde(default = "default_fanin_bind")]
    pub fanin_bind: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            fanout_bind: default_fanout_bind(),
            fanin_bind: default_fanin_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsConfig {
    /// Collect window for command dispatch, milliseconds.
    #[serde(default = "default_dispatch_window_ms")]
    pub dispatch_ms: u64,

    /// Collect window for probes and polls, milliseconds.
    #[serde(default = "default_poll_window_ms")]
    pub poll_ms: u64,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            dispatch_ms: default_dispatch_window_ms(),
            poll_ms: default_poll_window_ms(),
        }
    }
}

impl WindowsConfig {
    pub fn dispatch(&self) -> Duration {
        Duration::from_millis(self.dispatch_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_fanout_bind() -> String {
    "0.0.0.0:7241".to_string()
}

fn default_fanin_bind() -> String {
    "0.0.0.0:7242".to_string()
}

fn default_dispatch_window_ms() -> u64 {
    1000
}

fn default_poll_window_ms() -> u64 {
    10_000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl BrokerConfig {
    /// Load configuration from an explicit YAML file, or defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.fanout_bind == self.channels.fanin_bind {
            return Err(ConfigError::Invalid(format!(
                "fan-out and fan-in channels must bind distinct addresses (both {})",
                self.channels.fanout_bind
            )));
        }
        if self.windows.dispatch_ms == 0 || self.windows.poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "collect windows must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrokerConfig::load(None).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.windows.dispatch(), Duration::from_millis(1000));
        assert_eq!(config.windows.poll(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "http:\n  port: 9000\nchannels:\n  fanout_bind: 127.0.0.1:6000"
        )
        .unwrap();

        let config = BrokerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.channels.fanout_bind, "127.0.0.1:6000");
        assert_eq!(config.channels.fanin_bind, "0.0.0.0:7242");
    }

    #[test]
    fn test_identical_channel_binds_rejected() {
        let config = BrokerConfig {
            channels: ChannelsConfig {
                fanout_bind: "0.0.0.0:7000".into(),
                fanin_bind: "0.0.0.0:7000".into(),
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
