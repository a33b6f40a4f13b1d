//! # NMEA Module
//!
//! Decoding of NMEA 0183 sentences streamed by the GPS receiver.
//!
//! This module handles:
//! - Sentence framing and checksum verification
//! - GGA position decoding
//! - Degrees/minutes to decimal degrees conversion

pub mod checksum;
pub mod decoder;
pub mod protocol;

use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncRead;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::live::LiveState;
use crate::serial::listen_lines;

/// Decode every line from the GPS port into the live state
///
/// Each accepted fix also fires `wake`, asking the signal poller for a fresh
/// sample to pair with it. Lines that are not valid GGA fixes are dropped.
pub async fn run_fix_listener<R>(
    reader: R,
    live: LiveState,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    listen_lines("GPS", reader, cancel, |line| {
        if let Some(fix) = decoder::decode_fix(line, Utc::now()) {
            live.record_fix(fix);
            wake.notify_one();
        }
    })
    .await;
}
