//! # Telemetry Frame Module
//!
//! The wire format emitted by the CanSat over the serial downlink.
//!
//! This module handles:
//! - The canonical 19-field comma-separated frame schema
//! - Decoding one text line into a [`TelemetryRecord`]
//! - Tagging malformed lines as [`DecodeFailure`] instead of dropping them
//!
//! The schema here is the single source of truth for field order. Consumers
//! must never re-split lines with their own field offsets.

pub mod schema;
pub mod decoder;

pub use decoder::decode;
pub use schema::{DecodeFailure, TelemetryRecord, FRAME_FIELD_COUNT, SEQUENCE_FIELD_INDEX};
