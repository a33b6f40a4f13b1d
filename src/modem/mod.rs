//! # Modem Module
//!
//! Signal quality acquisition from an AT-command cellular modem.
//!
//! This module handles:
//! - Correlating `AT+CSQ` queries with `+CSQ: ` responses
//! - Polling the modem whenever a new fix arrives
//! - Publishing the latest sample to the live state

pub mod correlator;

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, SurveyError};
use crate::live::LiveState;
use crate::model::SignalSample;
use crate::serial::listen_lines;
use correlator::ModemCorrelator;

/// Feed every line from the modem port to the correlator
pub async fn run_modem_listener<R>(reader: R, correlator: Arc<ModemCorrelator>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    listen_lines("modem", reader, cancel, |line| {
        correlator.handle_line(line);
    })
    .await;
}

/// Single worker that refreshes the signal sample on demand
///
/// Wake-ups that arrive while a query is running collapse into one.
pub struct SignalPoller {
    correlator: Arc<ModemCorrelator>,
    live: LiveState,
    wake: Arc<Notify>,
}

impl SignalPoller {
    pub fn new(correlator: Arc<ModemCorrelator>, live: LiveState) -> Self {
        Self {
            correlator,
            live,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle used to request a fresh sample
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Query the modem once and publish the answer
    ///
    /// On failure the previous sample stays in the live state.
    pub async fn poll_once(&self) -> Result<SignalSample> {
        let sample = self.correlator.query().await?;
        self.live.record_signal(sample.clone());
        Ok(sample)
    }

    /// Poll each time the waker fires, until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        info!("Signal poller started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {
                    match self.poll_once().await {
                        Ok(_) => {}
                        Err(e @ SurveyError::QueryTimeout(_)) => {
                            warn!("{}; keeping previous signal sample", e);
                        }
                        Err(e) => warn!("Signal query failed: {}", e),
                    }
                }
            }
        }
        info!("Signal poller stopped");
    }
}
