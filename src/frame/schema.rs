//! # Frame Schema Constants and Types
//!
//! Core definitions for the CanSat telemetry wire format: one frame per
//! newline-terminated line, fields comma-separated, in a fixed 19-field
//! order. Embedded commas are not escaped; the device never emits them.

use serde::Serialize;
use thiserror::Error;

/// Number of comma-separated fields in one telemetry frame
pub const FRAME_FIELD_COUNT: usize = 19;

/// Zero-based index of the packet sequence number within a frame
pub const SEQUENCE_FIELD_INDEX: usize = 2;

/// Human-readable field names, in wire order
pub const FIELD_NAMES: [&str; FRAME_FIELD_COUNT] = [
    "Team ID",
    "Timestamp",
    "Packet Count",
    "Altitude",
    "Pressure",
    "Temperature",
    "Voltage",
    "GNSS Time",
    "GNSS Latitude",
    "GNSS Longitude",
    "GNSS Altitude",
    "GNSS Satellites",
    "Accel X",
    "Accel Y",
    "Accel Z",
    "Gyro X",
    "Gyro Y",
    "Gyro Z",
    "Flight State",
];

/// Why a line failed to decode into a [`TelemetryRecord`]
///
/// Carries the raw line so consumers can display or log the offending frame
/// verbatim. Decode failures are counted by the quality tracker, never
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DecodeFailure {
    /// Line did not split into exactly 19 comma-separated tokens
    #[error("expected 19 fields, found {found}: {raw:?}")]
    FieldCountMismatch {
        /// Token count actually observed
        found: usize,
        /// The raw line as received
        raw: String,
    },

    /// A token failed to parse into its expected numeric type
    #[error("field {field:?} is not numeric: {value:?}")]
    TypeCoercionError {
        /// Name of the offending field (from [`FIELD_NAMES`])
        field: &'static str,
        /// The raw token value
        value: String,
    },
}

/// One decoded telemetry frame — an immutable snapshot of a single line.
///
/// Every field stores the raw token text exactly as received. Display units
/// vary by consumer, so numeric coercion is left to the caller via the typed
/// accessors; the decoder's job is schema validation, not formatting. A
/// `TelemetryRecord` exists only if the source line split into exactly
/// [`FRAME_FIELD_COUNT`] tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    pub team_id: String,
    pub timestamp: String,
    pub packet_count: String,
    pub altitude: String,
    pub pressure: String,
    pub temperature: String,
    pub voltage: String,
    pub gnss_time: String,
    pub gnss_latitude: String,
    pub gnss_longitude: String,
    pub gnss_altitude: String,
    pub gnss_satellites: String,
    pub accel_x: String,
    pub accel_y: String,
    pub accel_z: String,
    pub gyro_x: String,
    pub gyro_y: String,
    pub gyro_z: String,
    pub flight_state: String,
}

impl TelemetryRecord {
    /// Build a record from exactly 19 tokens, in wire order.
    ///
    /// Callers are expected to have validated the count; this is the single
    /// place where positional assignment happens.
    pub(crate) fn from_tokens(tokens: &[&str]) -> Self {
        debug_assert_eq!(tokens.len(), FRAME_FIELD_COUNT);
        Self {
            team_id: tokens[0].to_string(),
            timestamp: tokens[1].to_string(),
            packet_count: tokens[2].to_string(),
            altitude: tokens[3].to_string(),
            pressure: tokens[4].to_string(),
            temperature: tokens[5].to_string(),
            voltage: tokens[6].to_string(),
            gnss_time: tokens[7].to_string(),
            gnss_latitude: tokens[8].to_string(),
            gnss_longitude: tokens[9].to_string(),
            gnss_altitude: tokens[10].to_string(),
            gnss_satellites: tokens[11].to_string(),
            accel_x: tokens[12].to_string(),
            accel_y: tokens[13].to_string(),
            accel_z: tokens[14].to_string(),
            gyro_x: tokens[15].to_string(),
            gyro_y: tokens[16].to_string(),
            gyro_z: tokens[17].to_string(),
            flight_state: tokens[18].to_string(),
        }
    }

    /// All fields as raw tokens, in wire order
    pub fn fields(&self) -> [&str; FRAME_FIELD_COUNT] {
        [
            &self.team_id,
            &self.timestamp,
            &self.packet_count,
            &self.altitude,
            &self.pressure,
            &self.temperature,
            &self.voltage,
            &self.gnss_time,
            &self.gnss_latitude,
            &self.gnss_longitude,
            &self.gnss_altitude,
            &self.gnss_satellites,
            &self.accel_x,
            &self.accel_y,
            &self.accel_z,
            &self.gyro_x,
            &self.gyro_y,
            &self.gyro_z,
            &self.flight_state,
        ]
    }

    /// Re-join the record into its wire representation
    pub fn to_line(&self) -> String {
        self.fields().join(",")
    }

    /// Packet sequence number (field index 2) coerced to integer
    ///
    /// # Errors
    ///
    /// Returns [`DecodeFailure::TypeCoercionError`] if the token is not an
    /// integer. The quality tracker applies its own leniency on top of this
    /// (falls back to `last_id + 1`), so a garbled id never cascades.
    pub fn sequence_number(&self) -> Result<i64, DecodeFailure> {
        self.int_field("Packet Count", &self.packet_count)
    }

    /// Altitude in device-native units
    pub fn altitude_value(&self) -> Result<f64, DecodeFailure> {
        self.float_field("Altitude", &self.altitude)
    }

    /// GNSS latitude in degrees
    pub fn gnss_latitude_value(&self) -> Result<f64, DecodeFailure> {
        self.float_field("GNSS Latitude", &self.gnss_latitude)
    }

    /// GNSS longitude in degrees
    pub fn gnss_longitude_value(&self) -> Result<f64, DecodeFailure> {
        self.float_field("GNSS Longitude", &self.gnss_longitude)
    }

    fn int_field(&self, field: &'static str, value: &str) -> Result<i64, DecodeFailure> {
        value.trim().parse().map_err(|_| DecodeFailure::TypeCoercionError {
            field,
            value: value.to_string(),
        })
    }

    fn float_field(&self, field: &'static str, value: &str) -> Result<f64, DecodeFailure> {
        value.trim().parse().map_err(|_| DecodeFailure::TypeCoercionError {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "T1,00:00:01,1,100.0,101325,25.0,3.7,00:00:01,12.34,56.78,101,8,0,0,0,0,0,0,IDLE";

    fn sample_record() -> TelemetryRecord {
        let tokens: Vec<&str> = SAMPLE.split(',').collect();
        TelemetryRecord::from_tokens(&tokens)
    }

    #[test]
    fn test_field_names_match_frame_width() {
        assert_eq!(FIELD_NAMES.len(), FRAME_FIELD_COUNT);
        assert_eq!(FIELD_NAMES[SEQUENCE_FIELD_INDEX], "Packet Count");
    }

    #[test]
    fn test_positional_assignment() {
        let record = sample_record();
        assert_eq!(record.team_id, "T1");
        assert_eq!(record.packet_count, "1");
        assert_eq!(record.gnss_satellites, "8");
        assert_eq!(record.flight_state, "IDLE");
    }

    #[test]
    fn test_to_line_round_trip() {
        let record = sample_record();
        assert_eq!(record.to_line(), SAMPLE);
    }

    #[test]
    fn test_sequence_number_coercion() {
        let record = sample_record();
        assert_eq!(record.sequence_number().unwrap(), 1);
    }

    #[test]
    fn test_typed_accessor_reports_field_name() {
        let mut record = sample_record();
        record.altitude = "not-a-number".to_string();

        match record.altitude_value() {
            Err(DecodeFailure::TypeCoercionError { field, value }) => {
                assert_eq!(field, "Altitude");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("expected TypeCoercionError, got: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_accessors_on_gnss_fields() {
        let record = sample_record();
        assert_eq!(record.gnss_latitude_value().unwrap(), 12.34);
        assert_eq!(record.gnss_longitude_value().unwrap(), 56.78);
    }
}
