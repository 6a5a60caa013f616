//! CLI configuration loading and merging.
//!
//! Configuration precedence:
//! 1. CLI arguments (handled by clap)
//! 2. Local config file (./.cantorrc)
//! 3. Global config file (~/.cantor/config.toml)
//! 4. Defaults

use anyhow::Context;
use cantor_models::{CacheConfig, DeploymentProfile, LoaderFactory, SlotCache, Studio};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// CLI configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Deployment profile (cpu, gpu)
    #[serde(default)]
    pub profile: Option<String>,

    /// Number of models kept resident
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Where generated audio is written
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding local model snapshots
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Inference backend
    #[serde(default)]
    pub backend: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Request defaults
    #[serde(default)]
    pub defaults: RequestDefaults,
}

/// Defaults applied to requests that leave a field out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestDefaults {
    /// Built-in speaker
    #[serde(default)]
    pub speaker: Option<String>,

    /// Language name
    #[serde(default)]
    pub language: Option<String>,

    /// Model size
    #[serde(default)]
    pub size: Option<String>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum CliConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, CliConfigError> {
        if !path.exists() {
            return Err(CliConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CliConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| CliConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cantor").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".cantorrc")
    }

    /// Discover and load configuration files.
    ///
    /// An explicit path must exist and parse. The global and local files are
    /// optional, but a file that exists and fails to parse is an error.
    pub fn discover_and_load(explicit: Option<&Path>) -> Result<Self, CliConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let mut config = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(found) => config.merge(&found),
                Err(CliConfigError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(config)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref profile) = other.profile {
            self.profile = Some(profile.clone());
        }
        if let Some(capacity) = other.capacity {
            self.capacity = Some(capacity);
        }
        if let Some(ref output_dir) = other.output_dir {
            self.output_dir = Some(output_dir.clone());
        }
        if let Some(ref model_dir) = other.model_dir {
            self.model_dir = Some(model_dir.clone());
        }
        if let Some(ref backend) = other.backend {
            self.backend = Some(backend.clone());
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        if let Some(ref speaker) = other.defaults.speaker {
            self.defaults.speaker = Some(speaker.clone());
        }
        if let Some(ref language) = other.defaults.language {
            self.defaults.language = Some(language.clone());
        }
        if let Some(ref size) = other.defaults.size {
            self.defaults.size = Some(size.clone());
        }
    }
}

/// Flags that override the configuration files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub capacity: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub backend: Option<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: DeploymentProfile,
    pub capacity: usize,
    pub output_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub backend: String,
    pub defaults: RequestDefaults,
}

impl Settings {
    /// Combine flags with the loaded configuration.
    pub fn resolve(overrides: Overrides, config: CliConfig) -> anyhow::Result<Self> {
        let profile = match overrides.profile.or(config.profile) {
            Some(name) => DeploymentProfile::from_str(&name)?,
            None => DeploymentProfile::default(),
        };
        let capacity =
            overrides.capacity.or(config.capacity).unwrap_or_else(|| profile.default_capacity());

        Ok(Self {
            profile,
            capacity,
            output_dir: overrides.output_dir.or(config.output_dir),
            model_dir: overrides.model_dir.or(config.model_dir),
            backend: overrides.backend.or(config.backend).unwrap_or_else(|| "mock".to_string()),
            defaults: config.defaults,
        })
    }

    /// Build the studio these settings describe.
    pub fn studio(&self) -> anyhow::Result<Studio> {
        let loader = LoaderFactory::create_from_str(&self.backend, self.model_dir.clone())
            .context("Failed to create model loader")?;
        let cache_config = CacheConfig::for_profile(self.profile).with_capacity(self.capacity);
        let cache = Arc::new(
            SlotCache::new(cache_config, loader).context("Invalid cache configuration")?,
        );
        let studio = match &self.output_dir {
            Some(dir) => Studio::new(cache, dir.clone()),
            None => Studio::with_temp_output(cache),
        };
        debug!(
            profile = %self.profile,
            capacity = self.capacity,
            output_dir = %studio.output_dir().display(),
            "Studio ready"
        );
        Ok(studio)
    }

    pub fn speaker(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.defaults.speaker.clone()).unwrap_or_else(|| "Ryan".to_string())
    }

    pub fn language(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.defaults.language.clone()).unwrap_or_else(|| "Auto".to_string())
    }

    pub fn size(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.defaults.size.clone()).unwrap_or_else(|| "0.6B".to_string())
    }
}
