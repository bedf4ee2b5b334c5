//! Control-layer configuration.
//!
//! One TOML document with a section per concern. Every section has a
//! `Default`; missing sections and keys fall back to it.
//!
//! ```toml
//! [recovery]
//! auto_handle_errors = true
//! programming_error_policy = "panic"
//!
//! [loopback]
//! latency_steps = 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {section}.{key}: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        reason: &'static str,
    },
}

/// What happens when a caller violates the call contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgrammingErrorPolicy {
    /// Log at error level and return the failure.
    #[default]
    Log,
    /// Log and panic. Meant for development builds.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Run error handling and the fallback transition without caller
    /// involvement.
    pub auto_handle_errors: bool,
    pub programming_error_policy: ProgrammingErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Warn when a dispatch discards events nobody drained.
    pub warn_on_dropped: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            warn_on_dropped: true,
        }
    }
}

/// Settings of the in-process loopback engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Engine steps between accepting a request and completing it.
    pub latency_steps: u32,
    pub local_station_id: u64,
    /// Session size used when a create request does not set one.
    pub max_stations: u16,
    /// Round trip reported for remote stations, at most [`BASE_RTT_MS_MAX`].
    pub base_rtt_ms: u32,
}

pub const BASE_RTT_MS_MAX: u32 = 60_000;

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency_steps: 1,
            local_station_id: 0x0100_0000_0000_0001,
            max_stations: 8,
            base_rtt_ms: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub recovery: RecoveryConfig,
    pub events: EventsConfig,
    pub loopback: LoopbackConfig,
    pub logging: LoggingConfig,
}

impl ControlConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ControlConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loopback.latency_steps == 0 {
            return Err(ConfigError::Invalid {
                section: "loopback",
                key: "latency_steps",
                reason: "must be at least 1",
            });
        }
        if self.loopback.max_stations < 2 {
            return Err(ConfigError::Invalid {
                section: "loopback",
                key: "max_stations",
                reason: "a session needs room for at least two stations",
            });
        }
        if self.loopback.local_station_id == 0 {
            return Err(ConfigError::Invalid {
                section: "loopback",
                key: "local_station_id",
                reason: "0 is reserved for the invalid id",
            });
        }
        if self.loopback.base_rtt_ms > BASE_RTT_MS_MAX {
            return Err(ConfigError::Invalid {
                section: "loopback",
                key: "base_rtt_ms",
                reason: "must not exceed one minute",
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                section: "logging",
                key: "level",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ControlConfig::from_toml_str("").unwrap();
        assert_eq!(config, ControlConfig::default());
        assert!(!config.recovery.auto_handle_errors);
        assert!(config.events.warn_on_dropped);
        assert_eq!(config.loopback.latency_steps, 1);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ControlConfig::from_toml_str(
            r#"
            [recovery]
            auto_handle_errors = true
            programming_error_policy = "panic"

            [loopback]
            latency_steps = 3
            "#,
        )
        .unwrap();
        assert!(config.recovery.auto_handle_errors);
        assert_eq!(
            config.recovery.programming_error_policy,
            ProgrammingErrorPolicy::Panic
        );
        assert_eq!(config.loopback.latency_steps, 3);
        assert_eq!(config.loopback.max_stations, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_zero_latency() {
        let err = ControlConfig::from_toml_str("[loopback]\nlatency_steps = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "latency_steps",
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_rtt() {
        let err = ControlConfig::from_toml_str("[loopback]\nbase_rtt_ms = 4294967294\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "base_rtt_ms",
                ..
            }
        ));
        let config = ControlConfig::from_toml_str("[loopback]\nbase_rtt_ms = 60000\n").unwrap();
        assert_eq!(config.loopback.base_rtt_ms, BASE_RTT_MS_MAX);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = ControlConfig::from_toml_str(
            "[recovery]\nprogramming_error_policy = \"ignore\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file_and_round_trip() {
        let mut config = ControlConfig::default();
        config.loopback.max_stations = 4;
        config.logging.level = "session_control=debug".into();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();
        let loaded = ControlConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = ControlConfig::load(&path).unwrap_err();
        match err {
            ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error {other}"),
        }
    }
}
