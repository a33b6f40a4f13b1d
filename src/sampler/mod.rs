//! # Sampler
//!
//! Turns the live state into durable records on a fixed tick.
//!
//! Each tick reads one consistent snapshot, and commits the current fix paired
//! with the latest signal sample when it is far enough from the anchor.

pub mod distance;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::live::LiveState;
use crate::model::{Fix, NewRecord};
use crate::store::RecordStore;
use distance::{fix_distance, should_commit};

/// Which fix the distance gate measures against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    /// The fix of the last committed record
    #[default]
    LastRecord,
    /// The fix displaced by the current one in the live state
    ///
    /// This is the classic gate: distance from the previous fix to the current one.
    PreviousFix,
}

/// Distance-gated sampler
pub struct Sampler {
    live: LiveState,
    store: Arc<dyn RecordStore>,
    threshold_m: f64,
    policy: AnchorPolicy,
    last_committed: Option<Fix>,
}

impl Sampler {
    pub fn new(
        live: LiveState,
        store: Arc<dyn RecordStore>,
        threshold_m: f64,
        policy: AnchorPolicy,
    ) -> Self {
        Self {
            live,
            store,
            threshold_m,
            policy,
            last_committed: None,
        }
    }

    /// Anchor the gate on the newest stored record, so a restart in place
    /// does not commit a duplicate
    pub async fn seed(&mut self) -> Result<()> {
        if let Some(record) = self.store.latest().await? {
            debug!("Sampler anchored on stored record {}", record.id);
            self.last_committed = Some(record.fix());
        }
        Ok(())
    }

    /// Run one gate decision
    ///
    /// # Returns
    ///
    /// The id of the committed record, or `None` when nothing was committed
    ///
    /// # Errors
    ///
    /// Returns the store error if the append failed; the anchor is left
    /// unchanged so the next tick tries again
    pub async fn tick(&mut self) -> Result<Option<i64>> {
        let snapshot = self.live.snapshot();

        let Some(signal) = snapshot.last_signal else {
            debug!("No signal sample yet, skipping tick");
            return Ok(None);
        };
        let Some(current) = snapshot.last_fix else {
            debug!("No fix yet, skipping tick");
            return Ok(None);
        };

        let anchor = match self.policy {
            AnchorPolicy::LastRecord => self.last_committed,
            AnchorPolicy::PreviousFix => snapshot.previous_fix,
        };

        if !should_commit(anchor.as_ref(), &current, self.threshold_m) {
            if let Some(anchor) = anchor {
                debug!(
                    "Moved {:.1} m since anchor, below {:.1} m threshold",
                    fix_distance(&anchor, &current),
                    self.threshold_m
                );
            }
            return Ok(None);
        }

        let id = self
            .store
            .append(NewRecord::from_fix(&current, &signal))
            .await?;
        self.last_committed = Some(current);
        info!(
            "Committed record {} at ({:.6}, {:.6}) csq {}",
            id, current.latitude, current.longitude, signal
        );
        Ok(Some(id))
    }

    /// Tick every `interval` until cancelled
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        info!("Sampler started, ticking every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Failed to commit sample: {}", e);
                    }
                }
            }
        }
        info!("Sampler stopped");
    }
}
