//! Configuration for the model slot cache.

use cantor_abstraction::{Device, LoadOptions, Precision};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Where the models run. Decides device placement and how many models may
/// stay resident at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    /// CPU only, shared RAM: one resident model, f32 weights.
    #[default]
    Cpu,
    /// GPU: several resident models, bf16 weights.
    Gpu,
}

impl DeploymentProfile {
    /// Loader placement for this profile.
    #[must_use]
    pub const fn load_options(self) -> LoadOptions {
        match self {
            Self::Cpu => LoadOptions { device: Device::Cpu, precision: Precision::F32 },
            Self::Gpu => LoadOptions { device: Device::Cuda, precision: Precision::Bf16 },
        }
    }

    /// Default number of resident models for this profile.
    #[must_use]
    pub const fn default_capacity(self) -> usize {
        match self {
            Self::Cpu => 1,
            Self::Gpu => 3,
        }
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for DeploymentProfile {
    type Err = CacheConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" | "cuda" => Ok(Self::Gpu),
            _ => Err(CacheConfigError::UnknownProfile(s.to_string())),
        }
    }
}

/// Configuration for the slot cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of models kept resident (default: 1).
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Ask the loader to reclaim memory after each release (default: true).
    #[serde(default = "default_reclaim_after_release")]
    pub reclaim_after_release: bool,

    /// Device placement handed to the loader.
    #[serde(default)]
    pub load_options: LoadOptions,
}

fn default_capacity() -> usize {
    1
}

fn default_reclaim_after_release() -> bool {
    true
}

/// Errors that can occur during cache configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheConfigError {
    /// Invalid capacity (must be > 0).
    #[error("Invalid cache capacity: must be greater than 0")]
    InvalidCapacity,

    /// Unknown deployment profile name.
    #[error("Unknown deployment profile '{0}' (expected cpu or gpu)")]
    UnknownProfile(String),
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            reclaim_after_release: default_reclaim_after_release(),
            load_options: LoadOptions::default(),
        }
    }
}

impl CacheConfig {
    /// Configuration matching a deployment profile.
    #[must_use]
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        Self {
            capacity: profile.default_capacity(),
            reclaim_after_release: default_reclaim_after_release(),
            load_options: profile.load_options(),
        }
    }

    /// Override the capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.capacity == 0 {
            return Err(CacheConfigError::InvalidCapacity);
        }
        Ok(())
    }
}
