//! # Survey Weather
//!
//! Backfills historical weather for every remote record that lacks it, and
//! serves the records (plus the map page) over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use signal_survey::backfill::BackfillQueue;
use signal_survey::config::Config;
use signal_survey::logging;
use signal_survey::remote::PgRemoteStore;
use signal_survey::server;
use signal_survey::weather::WeatherClient;

/// Command line options
#[derive(Debug, Parser)]
#[command(name = "survey-weather", version, about = "Backfill weather for surveyed samples")]
struct Cli {
    /// Configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Milliseconds to wait between sweeps for records missing weather
    #[arg(long)]
    delay: Option<u64>,
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<(Config, Duration)> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.weather.validate_api_key()?;

    let delay = match cli.delay {
        Some(0) => return Err(anyhow!("--delay must be greater than 0")),
        Some(ms) => Duration::from_millis(ms),
        None => config.backfill.sweep_delay(),
    };

    Ok((config, delay))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, delay) = load_config(&cli)?;
    let _log_guard = logging::init(&config.logging, "survey-weather.log");

    info!("Survey Weather v{} starting...", env!("CARGO_PKG_VERSION"));

    let remote = Arc::new(PgRemoteStore::connect_lazy(&config.remote));
    if config.remote.create_schema {
        if let Err(e) = remote.ensure_schema().await {
            warn!("Could not create the samples table: {}", e);
        }
    }

    let weather = Arc::new(WeatherClient::new(&config.weather)?);
    let queue = BackfillQueue::new(remote.clone(), weather);

    let cancel = CancellationToken::new();
    let backfill = tokio::spawn(queue.run(delay, cancel.clone()));

    let rocket = server::build(remote, &config.server)
        .ignite()
        .await
        .map_err(|e| anyhow!("Web server failed to start: {}", e))?;
    let shutdown = rocket.shutdown();
    info!(
        "Web server running on {}:{}",
        config.server.address, config.server.port
    );

    let server_cancel = cancel.clone();
    tokio::spawn(async move {
        server_cancel.cancelled().await;
        shutdown.notify();
    });

    let web = tokio::spawn(async move {
        if let Err(e) = rocket.launch().await {
            error!("Web server stopped: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    cancel.cancel();

    if let Err(e) = backfill.await {
        warn!("Backfill ended abnormally: {}", e);
    }
    if let Err(e) = web.await {
        warn!("Web server ended abnormally: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_required() {
        let cli = Cli::parse_from(["survey-weather"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_delay_override() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[weather]\napi_key = \"KEY\"\n").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from(["survey-weather", "--config", path]);
        let (_, delay) = load_config(&cli).unwrap();
        assert_eq!(delay, Duration::from_secs(600));

        let cli = Cli::parse_from(["survey-weather", "--config", path, "--delay", "1500"]);
        let (_, delay) = load_config(&cli).unwrap();
        assert_eq!(delay, Duration::from_millis(1500));

        let cli = Cli::parse_from(["survey-weather", "--config", path, "--delay", "0"]);
        assert!(load_config(&cli).is_err());
    }
}
