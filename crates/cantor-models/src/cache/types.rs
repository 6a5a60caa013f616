//! Core data types for the slot cache.

use cantor_abstraction::SpeechModel;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A resident model entry with bookkeeping.
#[derive(Clone)]
pub struct CachedModel {
    /// The loaded model handle.
    pub model: Arc<dyn SpeechModel>,
    /// Logical clock value of the last access. Higher is more recent.
    pub last_used: u64,
    /// Number of times this entry has been handed out.
    pub access_count: u64,
    /// When the model finished loading.
    pub loaded_at: Instant,
    /// How long the load took.
    pub load_time: Duration,
}

impl CachedModel {
    /// Create a new entry for a freshly loaded model.
    pub fn new(model: Arc<dyn SpeechModel>, tick: u64, load_time: Duration) -> Self {
        Self { model, last_used: tick, access_count: 1, loaded_at: Instant::now(), load_time }
    }

    /// Record an access at logical time `tick`.
    pub fn touch(&mut self, tick: u64) {
        self.last_used = tick;
        self.access_count += 1;
    }
}

impl std::fmt::Debug for CachedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedModel")
            .field("model_id", &self.model.model_id())
            .field("last_used", &self.last_used)
            .field("access_count", &self.access_count)
            .field("loaded_at", &self.loaded_at)
            .field("load_time", &self.load_time)
            .finish()
    }
}

/// Cache statistics for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served by a resident model.
    pub total_hits: u64,
    /// Requests that required a load.
    pub total_misses: u64,
    /// Successful loads.
    pub total_loads: u64,
    /// Loads that returned an error.
    pub load_failures: u64,
    /// Models released to make room or by `clear`.
    pub total_evictions: u64,
    /// Releases whose teardown reported an error.
    pub release_failures: u64,
    /// Current number of resident models.
    pub resident: usize,
}
