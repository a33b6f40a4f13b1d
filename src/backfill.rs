//! # Weather Backfill
//!
//! Fills the weather column of remote records, one fetch at a time.
//!
//! A sweep selects every record still missing weather and enriches them
//! sequentially. Whatever fails stays NULL and is picked up by a later sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::PendingWeather;
use crate::remote::RemoteStore;
use crate::weather::WeatherSource;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub found: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Sequential weather enricher for remote records
pub struct BackfillQueue {
    remote: Arc<dyn RemoteStore>,
    weather: Arc<dyn WeatherSource>,
}

impl BackfillQueue {
    pub fn new(remote: Arc<dyn RemoteStore>, weather: Arc<dyn WeatherSource>) -> Self {
        Self { remote, weather }
    }

    async fn enrich(&self, pending: &PendingWeather) -> Result<()> {
        let body = self
            .weather
            .fetch(
                pending.geom.latitude(),
                pending.geom.longitude(),
                pending.unix_timestamp(),
            )
            .await?;
        self.remote.update_weather(pending.id, &body).await
    }

    /// Enrich every record currently missing weather
    ///
    /// # Errors
    ///
    /// Returns an error only if the pending set could not be selected
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let pending = self.remote.select_missing_weather().await?;
        let mut report = SweepReport {
            found: pending.len(),
            ..Default::default()
        };

        for item in &pending {
            match self.enrich(item).await {
                Ok(()) => {
                    debug!("Updated weather for record {}", item.id);
                    report.enriched += 1;
                }
                Err(e) => {
                    warn!("Failed to backfill weather for record {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweep, then wait `delay`, until cancelled
    ///
    /// The delay starts when a sweep finishes, whether it succeeded or not,
    /// so a slow sweep never overlaps the next one.
    pub async fn run(self, delay: Duration, cancel: CancellationToken) {
        info!("Weather backfill started, sweeping every {:?}", delay);
        loop {
            let sweep = tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.sweep_once() => report,
            };
            match sweep {
                Ok(report) if report.found > 0 => info!(
                    "Backfill sweep: {} enriched, {} failed",
                    report.enriched, report.failed
                ),
                Ok(_) => debug!("No records missing weather"),
                Err(e) => error!("Error querying records missing weather: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("Weather backfill stopped");
    }
}
