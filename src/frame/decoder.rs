//! # Frame Decoder
//!
//! Decodes one raw telemetry line into a [`TelemetryRecord`].
//!
//! Validation here is strictly structural: the line must split into exactly
//! 19 comma-separated tokens, all-or-nothing. Semantic validation of numeric
//! fields is deferred to the quality tracker and to consumers, which keeps a
//! single bad field from suppressing an otherwise displayable frame.

use super::schema::{DecodeFailure, TelemetryRecord, FRAME_FIELD_COUNT};

/// Decode a telemetry line into a record
///
/// # Arguments
///
/// * `line` - One frame, without its trailing newline. Surrounding
///   whitespace is trimmed before splitting.
///
/// # Returns
///
/// * `Ok(TelemetryRecord)` - Line split into exactly 19 tokens
/// * `Err(DecodeFailure::FieldCountMismatch)` - Any other token count;
///   no partial record is ever constructed
///
/// # Examples
///
/// ```
/// use groundlink::frame::decode;
///
/// let line = "T1,00:00:01,1,100.0,101325,25.0,3.7,00:00:01,12.34,56.78,101,8,0,0,0,0,0,0,IDLE";
/// let record = decode(line).unwrap();
/// assert_eq!(record.team_id, "T1");
/// assert_eq!(record.flight_state, "IDLE");
/// ```
pub fn decode(line: &str) -> Result<TelemetryRecord, DecodeFailure> {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split(',').collect();

    if tokens.len() != FRAME_FIELD_COUNT {
        return Err(DecodeFailure::FieldCountMismatch {
            found: tokens.len(),
            raw: line.to_string(),
        });
    }

    Ok(TelemetryRecord::from_tokens(&tokens))
}
