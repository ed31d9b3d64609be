//! Runtime TOML configuration.
//!
//! Everything here has a compiled default so the unit also starts with no
//! config file at all. The file only overrides where the block lives, which
//! serial devices carry the two links and (for bench work) the task
//! intervals.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stage_common::consts::{
    FAULT_POLL_INTERVAL_MS, MOTION_POLL_INTERVAL_MS, REMOTE_RECEIVE_INTERVAL_MS,
    REMOTE_SEND_INTERVAL_MS, SERIAL_CHECK_INTERVAL_MS,
};
use thiserror::Error;

/// Configuration loading or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// TOML syntax or shape error.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field value is out of its accepted range.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Cooperative-cycle task intervals in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Intervals {
    /// Host command dispatch cadence.
    pub serial_ms: u64,
    /// Remote-unit inbound cadence.
    pub remote_rx_ms: u64,
    /// Remote-unit position broadcast cadence.
    pub remote_send_ms: u64,
    /// Driver fault poll cadence.
    pub fault_ms: u64,
    /// Motion progress poll cadence.
    pub motion_ms: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            serial_ms: SERIAL_CHECK_INTERVAL_MS,
            remote_rx_ms: REMOTE_RECEIVE_INTERVAL_MS,
            remote_send_ms: REMOTE_SEND_INTERVAL_MS,
            fault_ms: FAULT_POLL_INTERVAL_MS,
            motion_ms: MOTION_POLL_INTERVAL_MS,
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Location of the persisted parameter block.
    pub store_path: PathBuf,
    /// Host link device. `None` runs the link on an in-memory loopback.
    pub host_device: Option<PathBuf>,
    /// Remote-unit link device. `None` runs the link on an in-memory
    /// loopback.
    pub remote_device: Option<PathBuf>,
    /// Task intervals.
    pub intervals: Intervals,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("stage_params.bin"),
            host_device: None,
            remote_device: None,
            intervals: Intervals::default(),
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let iv = &self.intervals;
        for (name, ms) in [
            ("serial_ms", iv.serial_ms),
            ("remote_rx_ms", iv.remote_rx_ms),
            ("remote_send_ms", iv.remote_send_ms),
            ("fault_ms", iv.fault_ms),
            ("motion_ms", iv.motion_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "intervals.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate a runtime configuration file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RuntimeConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_task_cadence() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.intervals.serial_ms, 20);
        assert_eq!(cfg.intervals.remote_rx_ms, 10);
        assert_eq!(cfg.intervals.remote_send_ms, 200);
        assert_eq!(cfg.intervals.fault_ms, 50);
        assert_eq!(cfg.intervals.motion_ms, 10);
        assert!(cfg.host_device.is_none());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "store_path = \"/var/lib/stage/params.bin\"\n\
             [intervals]\nremote_send_ms = 500"
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.store_path, PathBuf::from("/var/lib/stage/params.bin"));
        assert_eq!(cfg.intervals.remote_send_ms, 500);
        assert_eq!(cfg.intervals.serial_ms, 20);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[intervals]\nmotion_ms = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "store_pathh = \"x\"").unwrap();
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/stage.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
