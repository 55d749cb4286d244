//! Latest-reading cache.
//!
//! A single slot holding the most recent [`Reading`]. Writers replace the
//! slot under an exclusive lock; readers copy it out under a shared lock, so
//! a reader never holds a reference into the live slot and never sees a
//! partially written reading.

use std::sync::{PoisonError, RwLock};

use crate::model::Reading;

/// Concurrency-safe holder of the most recent reading.
///
/// Shared by reference (usually behind an `Arc`) between the ingestion path
/// and query handlers.
#[derive(Debug, Default)]
pub struct LatestReading {
    slot: RwLock<Option<Reading>>,
}

impl LatestReading {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held reading. Last write wins.
    pub fn update(&self, reading: Reading) {
        // `Reading` is plain `Copy` data, so a poisoned lock cannot hold a
        // half-written value.
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(reading);
    }

    /// Snapshot of the held reading, or `None` before the first update.
    pub fn get(&self) -> Option<Reading> {
        *self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }
}
