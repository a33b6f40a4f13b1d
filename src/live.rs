//! # Live State
//!
//! Process-wide snapshot of the most recent fix and signal sample.
//!
//! The serial listeners write it and the sampler reads it, each on its own
//! schedule. All fields sit behind a single lock so a reader never sees the
//! latitude of one fix paired with the longitude of another.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::{Fix, SignalSample};

/// Copy of the live state at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    pub last_fix: Option<Fix>,
    /// The fix displaced by `last_fix`
    pub previous_fix: Option<Fix>,
    pub last_signal: Option<SignalSample>,
}

/// Shared handle to the live state
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    inner: Arc<Mutex<LiveSnapshot>>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly decoded fix, shifting the current one to `previous_fix`
    pub fn record_fix(&self, fix: Fix) {
        let mut state = self.lock();
        state.previous_fix = state.last_fix.replace(fix);
    }

    /// Record the result of a completed signal query
    pub fn record_signal(&self, sample: SignalSample) {
        self.lock().last_signal = Some(sample);
    }

    /// Consistent copy of every field
    pub fn snapshot(&self) -> LiveSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, LiveSnapshot> {
        // Every write replaces whole fields, so a poisoned snapshot is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
