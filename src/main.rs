//! # AFAR Bench
//!
//! Telemetry poller for phased-array control units.
//!
//! Connects to the configured link, finds the unit on point-to-point links
//! when no address is configured, then requests telemetry from every
//! configured unit at a fixed interval and appends it to rotating JSONL logs.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use afar_bench::config::{Config, LoggingConfig};
use afar_bench::driver::UnitDriver;
use afar_bench::telemetry::TelemetryLogger;
use afar_bench::wire::protocol::AddressingMode;

/// Config file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of polling rounds between status log messages
const LOG_INTERVAL_ROUNDS: u64 = 100;

/// Main entry point for AFAR Bench
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument or `config/default.toml`)
///    - Set up logging (console, plus daily files when configured)
///    - Open the link; discover the unit address on point-to-point links
///
/// 2. **Main Loop**
///    - Request telemetry from each configured unit every `poll_interval_ms`
///    - Append decoded records to the JSONL log
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Close the link
///    - Log total record count
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The link cannot be opened
/// - No unit answers discovery
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO afar_bench: AFAR Bench v0.1.0 starting...
/// INFO afar_bench::transport::serial: Opened serial port /dev/ttyUSB0 at 921600 baud
/// INFO afar_bench: Polling BU#1 every 1000 ms
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("AFAR Bench v{} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let mut driver = UnitDriver::connect(&config)
        .await
        .context("opening link to the control units")?;

    if config.addressing_mode() == AddressingMode::PointToPoint && driver.unit_address().is_none() {
        let address = driver
            .discover_unit_address()
            .await
            .context("discovering the control unit")?;
        info!("Found BU#{}", address);
    }

    let units = poll_targets(&config, driver.unit_address());
    if units.is_empty() {
        warn!("No units configured for telemetry polling");
    }

    let mut logger = if config.telemetry.enabled {
        Some(TelemetryLogger::from_config(&config.telemetry).context("opening telemetry log")?)
    } else {
        None
    };

    let mut poll = interval(Duration::from_millis(config.telemetry.poll_interval_ms));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling BU#{:?} every {} ms", units, config.telemetry.poll_interval_ms);
    info!("Press Ctrl+C to exit");

    let mut rounds: u64 = 0;
    let mut records: u64 = 0;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                for &unit in &units {
                    match driver.request_telemetry(unit).await {
                        Ok(Some(record)) => {
                            records += 1;
                            if let Some(logger) = logger.as_mut() {
                                if let Err(e) = logger.log(unit, &record) {
                                    warn!("BU#{}. Failed to log telemetry: {}", unit, e);
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("BU#{}. Telemetry failed: {}", unit, e),
                    }
                }

                rounds += 1;
                if rounds % LOG_INTERVAL_ROUNDS == 0 {
                    info!("{} polling rounds, {} telemetry records", rounds, records);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total telemetry records: {}", records);
                break;
            }
        }
    }

    driver.disconnect().await?;
    Ok(())
}

/// Console logging plus optional daily-rolling files.
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file output is flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "afar-bench.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Units polled for telemetry: the bound unit on point-to-point links, the
/// configured list on the bus
fn poll_targets(config: &Config, bound: Option<u8>) -> Vec<u8> {
    match config.addressing_mode() {
        AddressingMode::PointToPoint => bound.into_iter().collect(),
        AddressingMode::Bus => config.telemetry.units.clone(),
    }
}
