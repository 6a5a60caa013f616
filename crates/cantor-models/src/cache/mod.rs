//! Slot cache for loaded speech models.
//!
//! Loading a speech model takes seconds to minutes and occupies most of the
//! available memory, so models are loaded lazily on first use and kept in a
//! small, bounded set of slots. Eviction happens only when a new model is
//! requested or the cache is cleared explicitly.

pub mod cache;
pub mod config;
pub mod types;

pub use cache::{CacheError, SlotCache};
pub use config::{CacheConfig, CacheConfigError, DeploymentProfile};
pub use types::{CacheStats, CachedModel};
