//! # Serial Line Source
//!
//! Owns the serial connection to the CanSat receiver and turns its byte
//! stream into newline-delimited text.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Blocking line reads with an optional idle timeout
//! - Lenient byte decoding (undecodable bytes are replaced, never fatal)
//! - Enumerating available serial ports

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{GroundLinkError, Result};

pub mod line_source;

pub use line_source::{LineEvent, LineSource};

/// Buffered line reader over any byte stream
///
/// Accumulates partial lines across idle timeouts: bytes read before a
/// timeout fires stay in the buffer and the line completes on a later call.
pub struct LineReader<R> {
    reader: BufReader<R>,
    partial: Vec<u8>,
    idle_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R, idle_timeout: Option<Duration>) -> Self {
        Self {
            reader: BufReader::new(inner),
            partial: Vec::new(),
            idle_timeout,
        }
    }

    /// Read until a newline, the idle timeout, or end of stream
    pub async fn next_line(&mut self) -> io::Result<LineEvent> {
        loop {
            let mut byte = [0u8; 1];
            let read = match self.idle_timeout {
                Some(limit) => match timeout(limit, self.reader.read(&mut byte)).await {
                    Ok(result) => result?,
                    Err(_) => return Ok(LineEvent::Idle),
                },
                None => self.reader.read(&mut byte).await?,
            };

            if read == 0 {
                // Stream closed; a dangling partial line is not a frame.
                return Ok(LineEvent::Eof);
            }

            if byte[0] == b'\n' {
                let text = String::from_utf8_lossy(&self.partial)
                    .trim_end_matches('\r')
                    .to_string();
                self.partial.clear();
                return Ok(LineEvent::Line(text));
            }

            self.partial.push(byte[0]);
        }
    }
}

/// Serial port line source
///
/// Closing is drop-based and therefore idempotent; dropping the source
/// releases the underlying port.
pub struct SerialLineSource {
    reader: LineReader<tokio_serial::SerialStream>,
    port_name: String,
}

impl std::fmt::Debug for SerialLineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineSource")
            .field("port_name", &self.port_name)
            .finish_non_exhaustive()
    }
}

impl SerialLineSource {
    /// Open a serial port for telemetry reception
    ///
    /// # Arguments
    ///
    /// * `port` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line rate, one of the rates the receiver supports
    /// * `idle_timeout` - Optional read timeout; on expiry `read_line`
    ///   yields [`LineEvent::Idle`] instead of data
    ///
    /// # Errors
    ///
    /// Returns [`GroundLinkError::Connection`] if the port cannot be opened.
    pub fn open(port: &str, baud_rate: u32, idle_timeout: Option<Duration>) -> Result<Self> {
        debug!("opening serial port {} at {} baud", port, baud_rate);

        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                GroundLinkError::Connection(format!("failed to open {}: {}", port, e))
            })?;

        info!("opened serial port {} at {} baud", port, baud_rate);

        Ok(Self {
            reader: LineReader::new(stream, idle_timeout),
            port_name: port.to_string(),
        })
    }

    /// Device path of the opened port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn read_line(&mut self) -> io::Result<LineEvent> {
        self.reader.next_line().await
    }
}

/// List device paths of serial ports currently present on the system
pub fn available_ports() -> Vec<String> {
    tokio_serial::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_invalid_port_returns_connection_error() {
        let result = SerialLineSource::open("/dev/nonexistent_serial_12345", 115200, None);

        assert!(result.is_err());
        match result.unwrap_err() {
            GroundLinkError::Connection(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_12345"));
            }
            other => panic!("expected Connection error, got: {:?}", other),
        }
    }

    #[test]
    fn test_available_ports_does_not_panic() {
        // Result depends on the host; we only require a well-formed list.
        let _ = available_ports();
    }

    #[tokio::test]
    async fn test_line_reader_splits_on_newlines() {
        let stream = tokio_test::io::Builder::new()
            .read(b"T1,00:00:01,1\nT1,00:")
            .read(b"00:02,2\n")
            .build();
        let mut reader = LineReader::new(stream, None);

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineEvent::Line("T1,00:00:01,1".to_string())
        );
        assert_eq!(
            reader.next_line().await.unwrap(),
            LineEvent::Line("T1,00:00:02,2".to_string())
        );
        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Eof);
    }

    #[tokio::test]
    async fn test_line_reader_strips_carriage_return() {
        let stream = tokio_test::io::Builder::new().read(b"T1,x,3\r\n").build();
        let mut reader = LineReader::new(stream, None);

        assert_eq!(
            reader.next_line().await.unwrap(),
            LineEvent::Line("T1,x,3".to_string())
        );
    }

    #[tokio::test]
    async fn test_line_reader_replaces_undecodable_bytes() {
        let stream = tokio_test::io::Builder::new()
            .read(b"T1,\xff\xfe,7\n")
            .build();
        let mut reader = LineReader::new(stream, None);

        match reader.next_line().await.unwrap() {
            LineEvent::Line(text) => {
                assert!(text.starts_with("T1,"));
                assert!(text.ends_with(",7"));
                assert!(text.contains('\u{FFFD}'));
            }
            other => panic!("expected a line, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_line_reader_eof_discards_partial_line() {
        let stream = tokio_test::io::Builder::new().read(b"no newline").build();
        let mut reader = LineReader::new(stream, None);

        assert_eq!(reader.next_line().await.unwrap(), LineEvent::Eof);
    }
}
