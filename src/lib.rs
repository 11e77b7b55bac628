//! # GroundLink Library
//!
//! Serial telemetry ingestion and fan-out pipeline for a CanSat ground
//! station.
//!
//! This library provides the core of the ground station: a background
//! reader over the serial downlink, a fixed-schema frame decoder, a packet
//! quality tracker, and a distribution broker that fans decoded records out
//! to any number of independent consumers. Presentation (windows, maps,
//! exports) lives outside this crate and attaches through
//! [`TelemetryBroker::subscribe`](broker::TelemetryBroker::subscribe).

pub mod broker;
pub mod config;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod quality;
pub mod serial;
pub mod session;
