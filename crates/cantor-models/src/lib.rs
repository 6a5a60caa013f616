//! Speech model management for Cantor.
//!
//! This crate keeps expensive speech models resident on demand and turns
//! user requests into generated audio.
//!
//! # Layout
//!
//! - [`catalog`]: model families, variants and the keys that name them
//! - [`cache`]: the lazy slot cache with least-recently-used eviction
//! - [`chunker`] and [`narration`]: sentence splitting for long-form text
//! - [`studio`]: request handlers writing one WAV file per request
//! - [`mock`], [`snapshot`] and [`factory`]: loader backends

pub mod audio;
pub mod cache;
pub mod catalog;
pub mod chunker;
pub mod factory;
pub mod mock;
pub mod narration;
pub mod snapshot;
pub mod studio;

pub use cache::{
    CacheConfig, CacheConfigError, CacheError, CacheStats, CachedModel, DeploymentProfile,
    SlotCache,
};
pub use catalog::{CatalogError, ModelFamily, ModelKey};
pub use chunker::{Segments, TextChunker, split_sentences};
pub use factory::{BackendType, LoaderConfig, LoaderFactory};
pub use mock::{MOCK_SAMPLE_RATE, MockLoader, MockSpeechModel};
pub use narration::{Narration, NarrationError, SegmentProgress};
pub use snapshot::SnapshotLoader;
pub use studio::{
    CustomVoiceJob, ExpressiveJob, GeneratedAudio, Job, NarrationJob, Studio, StudioError,
    StudioResult, VoiceCloneJob, VoiceDesignJob,
};
