//! # Error Types
//!
//! Custom error types for GroundLink using `thiserror`.
//!
//! Only connection-level failures surface through this type. Per-line
//! data-quality problems (bad field counts, unparsable numbers) are carried
//! inside [`TelemetryUpdate`](crate::broker::TelemetryUpdate) deliveries and
//! counted by the quality tracker; they never abort the pipeline.

use thiserror::Error;

/// Main error type for GroundLink
#[derive(Debug, Error)]
pub enum GroundLinkError {
    /// Serial connection could not be opened
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Session log errors
    #[error("session log error: {0}")]
    Session(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for GroundLink
pub type Result<T> = std::result::Result<T, GroundLinkError>;
