//! # Session Logging Module
//!
//! Records one ground-station session to JSONL files.
//!
//! This module handles:
//! - Subscribing to the distribution broker like any other consumer
//! - Writing one JSON object per telemetry line (records and failures both)
//! - Rotating files after a maximum record count
//! - Retaining only the newest files
//!
//! The logger runs at its own pace on its own task; a slow disk never
//! back-pressures the reader loop (the broker drops its oldest queued
//! updates instead).

pub mod logger;

pub use logger::SessionLogger;
