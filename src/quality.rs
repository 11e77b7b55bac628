//! # Packet Quality Tracker
//!
//! Running loss/corruption statistics over the sequence-id stream.
//!
//! The tracker consumes every incoming line, regardless of decode outcome,
//! and maintains counters a dashboard can show next to the live data. All
//! parse failures degrade to counters; nothing in here can abort the
//! pipeline, no matter how malformed the input.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::frame::SEQUENCE_FIELD_INDEX;

/// Immutable snapshot of the quality counters, cloned out to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketQualitySnapshot {
    /// Lines that carried a usable sequence id (after leniency)
    pub total_packets: u64,
    /// Sum of gaps inferred from sequence-id jumps
    pub missing_packets: u64,
    /// Lines too short to even attempt sequencing
    pub corrupt_packets: u64,
    /// Last accepted sequence id, `None` until the first packet
    pub last_packet_id: Option<i64>,
    /// Wall-clock time of the last accepted line
    pub last_packet_time: Option<DateTime<Local>>,
}

impl PacketQualitySnapshot {
    /// Packet loss as a percentage of expected packets
    ///
    /// `missing / (total + missing) * 100`, or `0.0` when nothing has been
    /// expected yet.
    pub fn loss_percent(&self) -> f64 {
        let expected = self.total_packets + self.missing_packets;
        if expected == 0 {
            0.0
        } else {
            self.missing_packets as f64 / expected as f64 * 100.0
        }
    }
}

/// Stateful tracker; single logical owner (the reader loop)
///
/// Created fresh per connection so the counters describe one session.
#[derive(Debug, Default)]
pub struct PacketQualityTracker {
    total_packets: u64,
    missing_packets: u64,
    corrupt_packets: u64,
    last_packet_id: Option<i64>,
    last_packet_time: Option<DateTime<Local>>,
}

impl PacketQualityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one incoming line and return the updated snapshot
    ///
    /// Algorithm, run once per line:
    /// 1. Split on `,`; fewer than 3 tokens counts as corrupt, no sequencing.
    /// 2. Parse token index 2 as the sequence id; an unparsable id falls
    ///    back to `last_id + 1` so a single garbled id does not produce a
    ///    false loss report.
    /// 3. A jump past `last_id + 1` adds the gap width to `missing_packets`
    ///    (bursts count each skipped id once).
    /// 4. Duplicate or out-of-order ids are accepted as the new last id
    ///    without reopening previously counted gaps.
    pub fn observe(&mut self, line: &str) -> PacketQualitySnapshot {
        let parts: Vec<&str> = line.trim().split(',').collect();

        if parts.len() <= SEQUENCE_FIELD_INDEX {
            self.corrupt_packets += 1;
        } else {
            let packet_id = self.extract_packet_id(parts[SEQUENCE_FIELD_INDEX]);

            if let Some(last) = self.last_packet_id {
                // Saturating math: an extreme id (a parsable but garbage
                // token near i64::MIN/MAX) must corrupt the counters at
                // worst, never panic the reader.
                let gap = packet_id.saturating_sub(last).saturating_sub(1);
                if gap > 0 {
                    self.missing_packets += gap as u64;
                }
            }

            self.last_packet_id = Some(packet_id);
            self.total_packets += 1;
            self.last_packet_time = Some(Local::now());
        }

        self.snapshot()
    }

    /// Current counters without observing a line
    pub fn snapshot(&self) -> PacketQualitySnapshot {
        PacketQualitySnapshot {
            total_packets: self.total_packets,
            missing_packets: self.missing_packets,
            corrupt_packets: self.corrupt_packets,
            last_packet_id: self.last_packet_id,
            last_packet_time: self.last_packet_time,
        }
    }

    // Unparsable ids are treated as "the next expected one" rather than a
    // hard failure.
    fn extract_packet_id(&self, token: &str) -> i64 {
        token
            .trim()
            .parse()
            .unwrap_or_else(|_| self.last_packet_id.map_or(0, |last| last.saturating_add(1)))
    }
}
