//! Model abstraction layer for Cantor.
//!
//! This module defines the core traits and types for loading speech models and
//! invoking them. Concrete engines live behind [`ModelLoader`] and
//! [`SpeechModel`]; nothing here knows how a model computes its samples.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Represents an error raised by a model collaborator (loader or handle).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// The model could not be loaded (download failure, missing weights, out of memory).
    #[error("Load Error: {0}")]
    LoadError(String),

    /// The model failed while generating audio.
    #[error("Generation Error: {0}")]
    GenerationError(String),

    /// The request handed to the model is invalid (bad parameters, malformed reference audio).
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// The handle was released and can no longer be used.
    #[error("Model '{0}' has been released")]
    Released(String),

    /// Tearing down the model failed.
    #[error("Release Error: {0}")]
    ReleaseError(String),

    /// The requested model or backend is not supported.
    #[error("Unsupported Model: {0}")]
    UnsupportedModel(String),

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Device a model is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory, CPU execution.
    Cpu,
    /// CUDA device memory.
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Numeric precision used for model weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floats, the stable choice on CPU.
    F32,
    /// bfloat16, for GPU execution.
    Bf16,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::Bf16 => write!(f, "bf16"),
        }
    }
}

/// Placement options passed to a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Target device.
    pub device: Device,
    /// Weight precision.
    pub precision: Precision,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { device: Device::Cpu, precision: Precision::F32 }
    }
}

/// Everything a loader needs to construct one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTarget {
    /// Stable identifier of the model (e.g. "CustomVoice_0.6B").
    pub model_id: String,
    /// Upstream repository the weights come from.
    pub repo_id: String,
    /// Device placement.
    pub options: LoadOptions,
    /// Local directory holding the weights, once resolved.
    pub weights_dir: Option<PathBuf>,
}

/// Mono audio samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Samples per second.
    pub sample_rate: u32,
}

impl AudioClip {
    /// Creates a new clip.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Playback length of the clip.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Returns `true` if the clip has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reference voice used for cloning or conditioning.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAudio {
    /// The reference recording.
    pub clip: AudioClip,
    /// What is being said in the recording, if known.
    pub transcript: Option<String>,
}

/// Parameters for controlling speech generation.
///
/// Not every engine honours every field; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f32,
    /// Minimum token probability relative to the best token.
    pub min_p: f32,
    /// Emotional exaggeration.
    pub exaggeration: f32,
    /// Classifier-free guidance weight (pace/consistency).
    pub cfg_weight: f32,
    /// Random seed; 0 leaves the engine unseeded.
    pub seed: u64,
    /// Upper bound on generated codec tokens.
    pub max_new_tokens: u32,
    /// Clone from the speaker embedding only, ignoring the reference transcript.
    pub x_vector_only: bool,
    /// Normalize loudness of the output.
    pub normalize_loudness: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.95,
            top_k: 1000,
            repetition_penalty: 1.2,
            min_p: 0.0,
            exaggeration: 0.5,
            cfg_weight: 0.5,
            seed: 0,
            max_new_tokens: 512,
            x_vector_only: false,
            normalize_loudness: true,
        }
    }
}

impl GenerationParameters {
    /// Range-check the parameters.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidInput` naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_range("temperature", self.temperature, 0.05, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        check_range("min_p", self.min_p, 0.0, 1.0)?;
        check_range("repetition_penalty", self.repetition_penalty, 1.0, 2.0)?;
        check_range("exaggeration", self.exaggeration, 0.25, 2.0)?;
        check_range("cfg_weight", self.cfg_weight, 0.1, 1.0)?;
        if self.max_new_tokens == 0 {
            return Err(ModelError::InvalidInput("max_new_tokens must be greater than 0".into()));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<(), ModelError> {
    if value.is_nan() || value < min || value > max {
        return Err(ModelError::InvalidInput(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// One request to a speech model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeechRequest {
    /// Text to speak.
    pub text: String,
    /// Language name or id; `None` lets the model detect it.
    pub language: Option<String>,
    /// Built-in speaker (normalized, e.g. "uncle_fu").
    pub speaker: Option<String>,
    /// Free-form style instruction or voice description.
    pub instruct: Option<String>,
    /// Reference voice.
    pub reference: Option<ReferenceAudio>,
    /// Sampling parameters.
    pub parameters: GenerationParameters,
}

impl SpeechRequest {
    /// Creates a request for `text` with default parameters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

/// A loaded speech model.
///
/// Handles are expensive to construct and cheap to invoke. Once
/// [`release`](SpeechModel::release) has been called the handle must refuse
/// further work.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Generates audio for the request.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails or the handle was released.
    async fn generate(&self, request: &SpeechRequest) -> Result<AudioClip, ModelError>;

    /// Frees the resources backing this handle. Irreversible.
    ///
    /// # Errors
    /// Returns `ModelError::ReleaseError` if teardown fails.
    fn release(&self) -> Result<(), ModelError>;

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;

    /// Fixed output sample rate of this model.
    fn sample_rate(&self) -> u32;
}

/// Constructs [`SpeechModel`] handles.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads the model described by `target`.
    ///
    /// # Errors
    /// Returns `ModelError::LoadError` (or another variant) carrying the cause.
    async fn load(&self, target: &LoadTarget) -> Result<Arc<dyn SpeechModel>, ModelError>;

    /// Best-effort hint to reclaim memory after a handle was released.
    fn reclaim(&self) {}

    /// Short name of the backend, for logs.
    fn name(&self) -> &str;
}
