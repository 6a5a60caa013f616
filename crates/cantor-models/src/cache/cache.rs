//! SlotCache implementation with lazy loading and LRU eviction.

use crate::catalog::ModelKey;
use cantor_abstraction::{ModelError, ModelLoader, SpeechModel};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::config::{CacheConfig, CacheConfigError};
use super::types::{CacheStats, CachedModel};

/// Errors returned by [`SlotCache::acquire`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// The loader failed to construct the model. The key is not resident.
    #[error("Failed to load model {key}: {source}")]
    ModelLoad {
        /// The key that was requested.
        key: ModelKey,
        /// Cause reported by the loader.
        #[source]
        source: ModelError,
    },
}

/// State guarded by the cache lock.
#[derive(Debug, Default)]
struct SlotTable {
    entries: HashMap<ModelKey, CachedModel>,
    /// Logical clock for LRU ordering.
    clock: u64,
    stats: CacheStats,
}

/// Bounded cache of loaded model handles.
///
/// Holds at most `capacity` models. Requesting a key that is not resident
/// releases least-recently-used models until there is room, then loads the
/// new one. With capacity 1 this means every model switch unloads the
/// previous model before the next one is constructed, which bounds peak
/// memory to a single model.
///
/// The lock is held across eviction, load and install, so concurrent callers
/// asking for the same key wait for one load and share its handle.
pub struct SlotCache {
    slots: Mutex<SlotTable>,
    loader: Arc<dyn ModelLoader>,
    config: CacheConfig,
}

impl std::fmt::Debug for SlotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCache")
            .field("loader", &self.loader.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SlotCache {
    /// Create a new slot cache.
    ///
    /// # Arguments
    /// * `config` - Cache configuration
    /// * `loader` - Collaborator that constructs model handles
    ///
    /// # Errors
    /// Returns `CacheConfigError` if the configuration is invalid.
    pub fn new(config: CacheConfig, loader: Arc<dyn ModelLoader>) -> Result<Self, CacheConfigError> {
        config.validate()?;

        Ok(Self { slots: Mutex::new(SlotTable::default()), loader, config })
    }

    /// Get the handle for `key`, loading it if it is not resident.
    ///
    /// A resident key is returned as-is (the same `Arc`). Otherwise
    /// least-recently-used models are released until a slot is free, and the
    /// loader is asked for the new model.
    ///
    /// # Errors
    /// Returns `CacheError::ModelLoad` if the loader fails. Models evicted to
    /// make room stay evicted, and `key` is not resident afterwards.
    pub async fn acquire(&self, key: &ModelKey) -> Result<Arc<dyn SpeechModel>, CacheError> {
        let mut guard = self.slots.lock().await;
        let table = &mut *guard;
        table.clock += 1;
        let tick = table.clock;

        if let Some(cached) = table.entries.get_mut(key) {
            cached.touch(tick);
            table.stats.total_hits += 1;
            debug!(key = %key, access_count = cached.access_count, "Cache hit");
            return Ok(Arc::clone(&cached.model));
        }

        table.stats.total_misses += 1;
        debug!(key = %key, resident = table.entries.len(), "Cache miss, loading model");

        while table.entries.len() >= self.config.capacity {
            let Some(lru_key) = Self::find_lru_key(&table.entries) else {
                break;
            };
            if let Some(cached) = table.entries.remove(&lru_key) {
                self.release_entry(&lru_key, cached, &mut table.stats);
            }
        }
        table.stats.resident = table.entries.len();

        let target = key.load_target(self.config.load_options);
        info!(
            key = %key,
            repo = %target.repo_id,
            device = %target.options.device,
            loader = self.loader.name(),
            "Loading model"
        );
        let started = Instant::now();

        match self.loader.load(&target).await {
            Ok(model) => {
                let load_time = started.elapsed();
                table
                    .entries
                    .insert(key.clone(), CachedModel::new(Arc::clone(&model), tick, load_time));
                table.stats.total_loads += 1;
                table.stats.resident = table.entries.len();
                info!(key = %key, elapsed_ms = load_time.as_millis(), "Model resident");
                Ok(model)
            }
            Err(source) => {
                table.stats.load_failures += 1;
                error!(key = %key, error = %source, "Model load failed");
                Err(CacheError::ModelLoad { key: key.clone(), source })
            }
        }
    }

    /// Release every resident model.
    ///
    /// Idempotent and infallible; teardown errors are logged.
    ///
    /// # Returns
    /// The number of models released.
    pub async fn clear(&self) -> usize {
        let mut guard = self.slots.lock().await;
        let table = &mut *guard;
        let drained: Vec<(ModelKey, CachedModel)> = table.entries.drain().collect();
        let cleared_count = drained.len();
        for (key, cached) in drained {
            self.release_entry(&key, cached, &mut table.stats);
        }
        table.stats.resident = 0;
        if cleared_count > 0 {
            info!(cleared_count, "Cleared all models from cache");
        } else {
            debug!("Clear requested on empty cache");
        }
        cleared_count
    }

    /// Release one model if it is resident.
    ///
    /// # Returns
    /// `true` if the model was resident and has been released.
    pub async fn remove(&self, key: &ModelKey) -> bool {
        let mut guard = self.slots.lock().await;
        let table = &mut *guard;
        let Some(cached) = table.entries.remove(key) else {
            return false;
        };
        self.release_entry(key, cached, &mut table.stats);
        table.stats.resident = table.entries.len();
        true
    }

    /// Keys currently resident.
    pub async fn resident_keys(&self) -> BTreeSet<ModelKey> {
        self.slots.lock().await.entries.keys().cloned().collect()
    }

    /// Returns `true` if `key` is resident.
    pub async fn contains(&self, key: &ModelKey) -> bool {
        self.slots.lock().await.entries.contains_key(key)
    }

    /// Snapshot of the cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let table = self.slots.lock().await;
        let mut stats = table.stats.clone();
        stats.resident = table.entries.len();
        stats
    }

    /// Get the cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Find the least-recently-used key.
    fn find_lru_key(entries: &HashMap<ModelKey, CachedModel>) -> Option<ModelKey> {
        entries.iter().min_by_key(|(_, cached)| cached.last_used).map(|(key, _)| key.clone())
    }

    /// Tear down an entry that has already left the table.
    ///
    /// Teardown failures are counted and logged, never returned.
    fn release_entry(&self, key: &ModelKey, cached: CachedModel, stats: &mut CacheStats) {
        match cached.model.release() {
            Ok(()) => info!(
                key = %key,
                access_count = cached.access_count,
                "Released model"
            ),
            Err(e) => {
                stats.release_failures += 1;
                warn!(key = %key, error = %e, "Model teardown failed, slot freed anyway");
            }
        }
        stats.total_evictions += 1;
        drop(cached);
        if self.config.reclaim_after_release {
            self.loader.reclaim();
        }
    }
}
