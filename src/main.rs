//! # GroundLink
//!
//! Serial telemetry ingestion and fan-out pipeline for a CanSat ground
//! station.
//!
//! The binary wires the pipeline to two consumers: a console view that
//! prints each decoded frame with the current link quality, and an optional
//! JSONL session logger. Richer front ends subscribe to the same broker.

use anyhow::Result;
use tracing::{info, warn};

mod broker;
mod config;
mod error;
mod frame;
mod pipeline;
mod quality;
mod serial;
mod session;

use broker::TelemetryBroker;
use config::Config;
use pipeline::Pipeline;
use session::SessionLogger;

const DEFAULT_CONFIG_PATH: &str = "groundlink.toml";

/// Main entry point for the GroundLink ground station
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (path from argv, falling back to defaults if the
///      default file is absent)
///    - Construct the broker and connect the pipeline
///
/// 2. **Streaming**
///    - Console consumer prints each frame and the quality counters
///    - Session logger appends every update to rotating JSONL files
///
/// 3. **Shutdown**
///    - Ctrl+C requests a disconnect; the reader loop closes the broker and
///      all consumers drain and exit
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("GroundLink v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        "connecting to {} at {} baud",
        config.serial.port, config.serial.baud_rate
    );

    let available = serial::available_ports();
    if !available.is_empty() {
        info!("serial ports present: {}", available.join(", "));
    }

    let broker = TelemetryBroker::new(config.broker.inbox_capacity);

    // Consumers subscribe before the stream starts so no frame is missed.
    let console = tokio::spawn(run_console_consumer(broker.subscribe()));

    let logger_task = if config.session_log.enabled {
        let logger = SessionLogger::new(&config.session_log)?;
        Some(tokio::spawn(logger.run(broker.subscribe())))
    } else {
        None
    };

    let handle = Pipeline::connect(&config.serial, broker.handle())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down...");
            handle.disconnect().await;
        }
        _ = watch_closed(handle.state()) => {
            warn!("telemetry stream closed");
        }
    }

    console.await?;
    if let Some(task) = logger_task {
        task.await?;
    }

    info!("GroundLink stopped");
    Ok(())
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Ok(Config::load(path)?),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(Config::load(DEFAULT_CONFIG_PATH)?)
        }
        None => {
            info!("no config file, using defaults");
            Ok(Config::default())
        }
    }
}

async fn watch_closed(mut state: tokio::sync::watch::Receiver<pipeline::LinkState>) {
    while state.changed().await.is_ok() {
        if *state.borrow() == pipeline::LinkState::Closed {
            return;
        }
    }
}

/// Print each frame and the running quality counters to the log
async fn run_console_consumer(mut subscription: broker::Subscription) {
    while let Some(update) = subscription.recv().await {
        match &update.decoded {
            Ok(record) => {
                info!(
                    packet = %record.packet_count,
                    altitude = %record.altitude,
                    state = %record.flight_state,
                    loss_percent = update.quality.loss_percent(),
                    "frame"
                );
            }
            Err(failure) => {
                warn!(
                    corrupt = update.quality.corrupt_packets,
                    "bad frame: {}", failure
                );
            }
        }
    }
}
