//! # Signal Survey Collector
//!
//! Records cellular signal quality along a route.
//!
//! Reads fixes from a GPS receiver and signal quality from a cellular modem,
//! commits a record every time the receiver has moved far enough, and pushes
//! records to the remote PostGIS store when it is reachable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use signal_survey::config::Config;
use signal_survey::live::LiveState;
use signal_survey::logging;
use signal_survey::modem::correlator::ModemCorrelator;
use signal_survey::modem::{run_modem_listener, SignalPoller};
use signal_survey::nmea::run_fix_listener;
use signal_survey::remote::PgRemoteStore;
use signal_survey::sampler::Sampler;
use signal_survey::serial::port_trait::TokioSerialPort;
use signal_survey::serial::SerialLink;
use signal_survey::store::{RecordStore, SqliteRecordStore};
use signal_survey::sync::SyncDriver;

/// Command line options
#[derive(Debug, Parser)]
#[command(name = "signal-survey", version, about = "Map cellular signal quality along a route")]
struct Cli {
    /// Configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GPS receiver serial port
    #[arg(long)]
    nmea_port: Option<String>,

    /// Cellular modem serial port
    #[arg(long)]
    modem_port: Option<String>,
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = &cli.nmea_port {
        config.serial.nmea_port = port.clone();
    }
    if let Some(port) = &cli.modem_port {
        config.serial.modem_port = port.clone();
    }
    config.validate()?;

    Ok(config)
}

/// Main entry point for the collector
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open the local record store and anchor the sampler on its newest record
///    - Configure the remote store (no connection is made yet)
///    - Open the GPS and modem serial ports
///
/// 2. **Running**
///    - GPS listener decodes fixes and wakes the signal poller
///    - Modem listener hands responses to the query correlator
///    - Sampler commits records on its tick
///    - Sync driver pushes unsynced records on its tick
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C cancels every loop between units of work
///    - Records not yet synced stay in the local store for the next run
///
/// # Errors
///
/// Returns error if the configuration is invalid, the local store cannot be
/// opened, or either serial port cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _log_guard = logging::init(&config.logging, "signal-survey.log");

    info!("Signal Survey v{} starting...", env!("CARGO_PKG_VERSION"));

    let local = Arc::new(
        SqliteRecordStore::open(&config.store.path)
            .with_context(|| format!("Failed to open record store {}", config.store.path.display()))?,
    );
    let remote = Arc::new(PgRemoteStore::connect_lazy(&config.remote));

    let gps = SerialLink::open(&config.serial.nmea_port, config.serial.baud_rate)?;
    let modem = SerialLink::open(&config.serial.modem_port, config.serial.baud_rate)?;
    info!("GPS on {}, modem on {}", gps.device_path(), modem.device_path());

    let (modem_reader, modem_writer) = modem.split();
    let correlator = Arc::new(ModemCorrelator::with_protocol(
        Box::new(TokioSerialPort::new(modem_writer)),
        config.modem.query_timeout(),
        &config.modem.command,
        &config.modem.response_prefix,
    ));

    let live = LiveState::new();
    let poller = SignalPoller::new(correlator.clone(), live.clone());
    let wake = poller.waker();

    let mut sampler = Sampler::new(
        live.clone(),
        local.clone(),
        config.sampler.distance_threshold_m,
        config.sampler.anchor,
    );
    if let Err(e) = sampler.seed().await {
        warn!("Could not read the latest stored record, starting unanchored: {}", e);
    }

    let sync = SyncDriver::new(local.clone(), remote);

    let cancel = CancellationToken::new();
    let tasks = vec![
        tokio::spawn(run_fix_listener(gps.into_stream(), live.clone(), wake, cancel.clone())),
        tokio::spawn(run_modem_listener(modem_reader, correlator, cancel.clone())),
        tokio::spawn(poller.run(cancel.clone())),
        tokio::spawn(sampler.run(config.sampler.interval(), cancel.clone())),
        tokio::spawn(sync.run(config.sync.interval(), cancel.clone())),
    ];

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }

    let remaining = local.count().await.unwrap_or_default();
    info!("{} records in the local store", remaining);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_port_overrides() {
        let cli = Cli::parse_from([
            "signal-survey",
            "--nmea-port",
            "/dev/ttyS0",
            "--modem-port",
            "/dev/ttyS1",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.serial.nmea_port, "/dev/ttyS0");
        assert_eq!(config.serial.modem_port, "/dev/ttyS1");
    }

    #[test]
    fn test_cli_defaults_without_config_file() {
        let cli = Cli::parse_from(["signal-survey"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.serial.nmea_port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_conflicting_override_rejected() {
        let cli = Cli::parse_from(["signal-survey", "--modem-port", "/dev/ttyUSB0"]);
        assert!(load_config(&cli).is_err());
    }
}
