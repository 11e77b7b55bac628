//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GroundLinkError, Result};

/// Baud rates the ground receiver supports
pub const SUPPORTED_BAUD_RATES: [u32; 3] = [9600, 115_200, 250_000];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub session_log: SessionLogConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout; zero disables it and reads block indefinitely
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

/// Distribution broker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

/// Session log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionLogConfig {
    #[serde(default = "default_session_log_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_idle_timeout_ms() -> u64 { 1000 }

fn default_inbox_capacity() -> usize { 256 }

fn default_session_log_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { inbox_capacity: default_inbox_capacity() }
    }
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_session_log_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl SerialConfig {
    /// Idle timeout as a `Duration`, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(GroundLinkError::ConfigInvalid(format!(
                "unsupported baud rate {} (supported: {:?})",
                self.serial.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }

        if self.broker.inbox_capacity == 0 {
            return Err(GroundLinkError::ConfigInvalid(
                "broker.inbox_capacity must be nonzero".to_string(),
            ));
        }

        if self.session_log.max_records_per_file == 0 {
            return Err(GroundLinkError::ConfigInvalid(
                "session_log.max_records_per_file must be nonzero".to_string(),
            ));
        }

        if self.session_log.max_files_to_keep == 0 {
            return Err(GroundLinkError::ConfigInvalid(
                "session_log.max_files_to_keep must be nonzero".to_string(),
            ));
        }

        Ok(())
    }
}
