//! # Reader Loop
//!
//! Orchestrates one serial connection: owns the line source, drives the
//! frame decoder and the quality tracker for every line, and publishes the
//! combined outcome through the distribution broker.
//!
//! Exactly one tokio task runs the loop for the lifetime of a connection.
//! `read_line` is the only point that blocks it; decode, track, and publish
//! are all bounded-time, so reader throughput is independent of consumer
//! speed. The core performs no automatic reconnection — an external
//! supervisor watching [`LinkState`] owns that policy.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{TelemetryBroker, TelemetryUpdate};
use crate::config::SerialConfig;
use crate::error::Result;
use crate::frame;
use crate::quality::PacketQualityTracker;
use crate::serial::{LineEvent, LineSource, SerialLineSource};

/// Number of lines between status log messages
const LOG_INTERVAL_LINES: u64 = 1000;

/// Connection lifecycle states, published over a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection requested yet
    #[default]
    Idle,
    /// Open in progress
    Connecting,
    /// Reader loop running
    Streaming,
    /// Disconnect requested, loop winding down
    Closing,
    /// Loop exited: disconnected, stream ended, or I/O error
    Closed,
}

/// The ingestion pipeline entry point
pub struct Pipeline;

impl Pipeline {
    /// Open the configured serial port and start the reader loop
    ///
    /// # Errors
    ///
    /// Returns [`GroundLinkError::Connection`](crate::error::GroundLinkError)
    /// if the port cannot be opened; no task is started and the broker is
    /// untouched in that case.
    pub fn connect(config: &SerialConfig, broker: TelemetryBroker) -> Result<PipelineHandle> {
        let source =
            SerialLineSource::open(&config.port, config.baud_rate, config.idle_timeout())?;
        Ok(Self::start(source, broker))
    }

    /// Start the reader loop over an already-open line source
    ///
    /// Useful for feeding the pipeline from something other than a serial
    /// port (tests, recorded streams).
    pub fn start<S>(source: S, broker: TelemetryBroker) -> PipelineHandle
    where
        S: LineSource + 'static,
    {
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(run_reader_loop(
            source,
            broker,
            state_tx,
            Arc::clone(&shutdown),
        ));

        PipelineHandle {
            shutdown,
            state: state_rx,
            task,
        }
    }
}

/// Handle to a running reader loop
///
/// Dropping the handle does not stop the loop; call
/// [`disconnect`](PipelineHandle::disconnect) for an orderly shutdown or
/// [`wait`](PipelineHandle::wait) to follow the connection to its natural
/// end.
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: Arc<Notify>,
    state: watch::Receiver<LinkState>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Watch receiver for connection state changes
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Current connection state
    pub fn current_state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Request shutdown and wait for the loop to exit
    ///
    /// The loop observes the request at its next read (the idle timeout
    /// bounds how long that takes on a silent link), finishes any in-flight
    /// publish, closes the broker, and exits.
    pub async fn disconnect(self) {
        self.shutdown.notify_one();
        let _ = self.task.await;
    }

    /// Wait for the loop to exit on its own (stream end or I/O error)
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

async fn run_reader_loop<S>(
    mut source: S,
    broker: TelemetryBroker,
    state_tx: watch::Sender<LinkState>,
    shutdown: Arc<Notify>,
) where
    S: LineSource,
{
    let mut tracker = PacketQualityTracker::new();
    let mut lines_seen: u64 = 0;

    state_tx.send_replace(LinkState::Streaming);
    info!("telemetry stream started");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                state_tx.send_replace(LinkState::Closing);
                info!("disconnect requested, closing stream");
                break;
            }

            event = source.read_line() => match event {
                Ok(LineEvent::Line(line)) => {
                    // The device pads quiet periods with bare newlines;
                    // they are not frames.
                    if line.is_empty() {
                        continue;
                    }

                    lines_seen += 1;
                    handle_line(line, &mut tracker, &broker);

                    if lines_seen % LOG_INTERVAL_LINES == 0 {
                        let snap = tracker.snapshot();
                        info!(
                            total = snap.total_packets,
                            missing = snap.missing_packets,
                            corrupt = snap.corrupt_packets,
                            loss_percent = snap.loss_percent(),
                            "processed {} lines", lines_seen
                        );
                    }
                }
                Ok(LineEvent::Idle) => continue,
                Ok(LineEvent::Eof) => {
                    info!("telemetry stream ended after {} lines", lines_seen);
                    break;
                }
                Err(e) => {
                    warn!("stream read failed: {}", e);
                    break;
                }
            }
        }
    }

    // In-flight publishes are done; further ones are rejected.
    broker.close();
    state_tx.send_replace(LinkState::Closed);
}

fn handle_line(line: String, tracker: &mut PacketQualityTracker, broker: &TelemetryBroker) {
    let decoded = frame::decode(&line);
    let quality = tracker.observe(&line);

    if let Err(failure) = &decoded {
        debug!(corrupt = quality.corrupt_packets, "decode failure: {}", failure);
    }

    broker.publish(TelemetryUpdate {
        raw: line,
        decoded,
        quality,
    });
}
