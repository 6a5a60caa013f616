//! Loader factory for creating model loaders from configuration.

use crate::{MockLoader, SnapshotLoader};
use cantor_abstraction::{ModelError, ModelLoader};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Inference backend enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Deterministic synthetic engine.
    #[default]
    Mock,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for BackendType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" | "synthetic" => Ok(Self::Mock),
            _ => {
                error!(backend = %s, "Unrecognized backend");
                Err(ModelError::UnsupportedModel(format!("Unrecognized backend: {s}")))
            }
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// The engine that constructs models.
    pub backend: BackendType,
    /// Directory holding local model snapshots. When set, loads fail for
    /// models whose snapshot is missing.
    pub model_dir: Option<PathBuf>,
}

impl LoaderConfig {
    /// Creates a new `LoaderConfig` for the given backend.
    #[must_use]
    pub fn new(backend: BackendType) -> Self {
        Self { backend, model_dir: None }
    }

    /// Sets the snapshot directory.
    #[must_use]
    pub fn with_model_dir(mut self, model_dir: PathBuf) -> Self {
        self.model_dir = Some(model_dir);
        self
    }
}

/// Factory for creating loaders.
pub struct LoaderFactory;

impl LoaderFactory {
    /// Creates a loader from the given configuration.
    pub fn create(config: LoaderConfig) -> Arc<dyn ModelLoader> {
        debug!(backend = %config.backend, model_dir = ?config.model_dir, "Creating loader");

        match (config.backend, config.model_dir) {
            (BackendType::Mock, None) => Arc::new(MockLoader::new()),
            (BackendType::Mock, Some(dir)) => Arc::new(SnapshotLoader::new(dir, MockLoader::new())),
        }
    }

    /// Creates a loader from a backend name.
    ///
    /// # Errors
    /// Returns a `ModelError` if the backend is unrecognized.
    pub fn create_from_str(backend: &str, model_dir: Option<PathBuf>) -> Result<Arc<dyn ModelLoader>, ModelError> {
        let backend = BackendType::from_str(backend)?;
        Ok(Self::create(LoaderConfig { backend, model_dir }))
    }
}
