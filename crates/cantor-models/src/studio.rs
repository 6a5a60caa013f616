//! Request handlers.
//!
//! A [`Studio`] owns a shared [`SlotCache`] and turns user-level jobs into
//! model requests: it validates the inputs, acquires the right model, runs
//! it and writes one WAV file per request.

use crate::audio::{self, AudioError};
use crate::cache::{CacheError, CacheStats, SlotCache};
use crate::catalog::{self, ModelFamily, ModelKey};
use crate::chunker::TextChunker;
use crate::narration::{self, NarrationError, SegmentProgress};
use cantor_abstraction::{AudioClip, GenerationParameters, ModelError, ReferenceAudio, SpeechRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors surfaced by the request handlers.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The request itself is invalid. Safe to show to the user verbatim.
    #[error("{0}")]
    InputValidation(String),

    /// The model could not be loaded.
    #[error("Failed to load model {key}: {source}")]
    ModelLoad {
        /// Requested model.
        key: ModelKey,
        /// Cause reported by the loader.
        #[source]
        source: ModelError,
    },

    /// The model failed while generating.
    #[error("Generation with {key} failed: {source}")]
    Generation {
        /// Model that failed.
        key: ModelKey,
        /// Cause reported by the model.
        #[source]
        source: ModelError,
    },

    /// Writing the output audio failed.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Preparing the output directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Short machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::ModelLoad { .. } => "model_load",
            Self::Generation { .. } => "generation",
            Self::Audio(_) => "audio",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error was caused by the request rather than the system.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InputValidation(_))
    }
}

impl From<CacheError> for StudioError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::ModelLoad { key, source } => Self::ModelLoad { key, source },
        }
    }
}

/// Result type for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

/// A finished generation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAudio {
    /// WAV file written for this request.
    pub path: PathBuf,
    /// Model that produced it.
    pub key: ModelKey,
    /// Output sample rate.
    pub sample_rate: u32,
    /// Length in seconds.
    pub duration_secs: f64,
    /// Number of segments generated (1 unless narrated).
    pub segments: usize,
}

fn default_language() -> String {
    "Auto".to_string()
}

fn default_speaker() -> String {
    "Ryan".to_string()
}

fn default_size() -> String {
    "0.6B".to_string()
}

/// Speech with a built-in speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomVoiceJob {
    /// Text to speak.
    pub text: String,
    /// Built-in speaker name.
    #[serde(default = "default_speaker")]
    pub speaker: String,
    /// Language name.
    #[serde(default = "default_language")]
    pub language: String,
    /// Optional style instruction.
    #[serde(default)]
    pub instruct: Option<String>,
    /// Model size.
    #[serde(default = "default_size")]
    pub size: String,
}

/// Speech in a voice described by text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceDesignJob {
    /// Text to speak.
    pub text: String,
    /// Description of the voice.
    pub description: String,
    /// Language name.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Speech in a voice cloned from a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCloneJob {
    /// Text to speak.
    pub text: String,
    /// WAV file with the voice to clone.
    pub reference: Option<PathBuf>,
    /// What is said in the reference recording.
    #[serde(default)]
    pub reference_text: Option<String>,
    /// Language name.
    #[serde(default = "default_language")]
    pub language: String,
    /// Clone from the speaker embedding only; no transcript needed.
    #[serde(default)]
    pub x_vector_only: bool,
    /// Model size.
    #[serde(default = "default_size")]
    pub size: String,
}

/// Expressive speech with the Turbo, Standard or Multilingual models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressiveJob {
    /// Text to speak. Turbo understands paralinguistic tags such as `[laugh]`.
    pub text: String,
    /// Which model to use.
    #[serde(default = "default_expressive_family")]
    pub model: ModelFamily,
    /// Optional voice reference.
    #[serde(default)]
    pub reference: Option<PathBuf>,
    /// Language id, required for Multilingual.
    #[serde(default)]
    pub language: Option<String>,
    /// Sampling parameters.
    #[serde(default)]
    pub parameters: GenerationParameters,
}

fn default_expressive_family() -> ModelFamily {
    ModelFamily::Turbo
}

/// Long-form narration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationJob {
    /// The story.
    pub text: String,
    /// Optional voice reference.
    #[serde(default)]
    pub reference: Option<PathBuf>,
    /// Sampling parameters.
    #[serde(default)]
    pub parameters: GenerationParameters,
    /// Drop punctuation-only segments shorter than this.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Split sentences longer than this at word boundaries.
    #[serde(default)]
    pub max_chars: Option<usize>,
}

fn default_min_chars() -> usize {
    crate::chunker::DEFAULT_MIN_CHARS
}

impl NarrationJob {
    fn chunker(&self) -> TextChunker {
        TextChunker::new().with_min_chars(self.min_chars).with_max_chars(self.max_chars)
    }

    /// Number of segments this job will generate.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.chunker().split(&self.text).total()
    }
}

/// Any job the studio can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Job {
    /// Built-in speaker.
    Speak(CustomVoiceJob),
    /// Designed voice.
    Design(VoiceDesignJob),
    /// Cloned voice.
    Clone(VoiceCloneJob),
    /// Expressive models.
    Expressive(ExpressiveJob),
    /// Long-form narration.
    Narrate(NarrationJob),
}

impl Job {
    /// Short label for listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Speak(_) => "speak",
            Self::Design(_) => "design",
            Self::Clone(_) => "clone",
            Self::Expressive(_) => "expressive",
            Self::Narrate(_) => "narrate",
        }
    }
}

/// Request handlers over one shared slot cache.
#[derive(Debug, Clone)]
pub struct Studio {
    cache: Arc<SlotCache>,
    output_dir: PathBuf,
}

impl Studio {
    /// Create a studio writing into `output_dir`.
    pub fn new(cache: Arc<SlotCache>, output_dir: impl Into<PathBuf>) -> Self {
        Self { cache, output_dir: output_dir.into() }
    }

    /// Create a studio writing into the system temp directory.
    pub fn with_temp_output(cache: Arc<SlotCache>) -> Self {
        Self::new(cache, std::env::temp_dir().join("cantor"))
    }

    /// Where output files go.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SlotCache> {
        &self.cache
    }

    /// Run any job. Narration progress is not reported.
    pub async fn run(&self, job: Job) -> StudioResult<GeneratedAudio> {
        match job {
            Job::Speak(job) => self.custom_voice(job).await,
            Job::Design(job) => self.voice_design(job).await,
            Job::Clone(job) => self.voice_clone(job).await,
            Job::Expressive(job) => self.expressive(job).await,
            Job::Narrate(job) => self.narrate(job, |_| {}).await,
        }
    }

    /// Speak with a built-in speaker.
    pub async fn custom_voice(&self, job: CustomVoiceJob) -> StudioResult<GeneratedAudio> {
        let text = require_text(&job.text)?;
        let speaker = catalog::find_speaker(&job.speaker).ok_or_else(|| {
            StudioError::InputValidation(format!(
                "unknown speaker '{}' (available: {})",
                job.speaker,
                catalog::SPEAKERS.join(", ")
            ))
        })?;
        let language = require_language(&job.language)?;
        let key = model_key(ModelFamily::CustomVoice, &job.size)?;

        let request = SpeechRequest {
            text,
            language: Some(language.to_string()),
            speaker: Some(catalog::normalize_speaker(speaker)),
            instruct: non_empty(job.instruct.as_deref()),
            ..SpeechRequest::default()
        };
        self.synthesize(&key, &request, "custom_voice").await
    }

    /// Speak in a voice built from a description.
    pub async fn voice_design(&self, job: VoiceDesignJob) -> StudioResult<GeneratedAudio> {
        let text = require_text(&job.text)?;
        let description = non_empty(Some(job.description.as_str())).ok_or_else(|| {
            StudioError::InputValidation("a voice description is required".to_string())
        })?;
        let language = require_language(&job.language)?;
        let key = ModelKey::default_for(ModelFamily::VoiceDesign);

        let request = SpeechRequest {
            text,
            language: Some(language.to_string()),
            instruct: Some(description),
            ..SpeechRequest::default()
        };
        self.synthesize(&key, &request, "voice_design").await
    }

    /// Speak in a voice cloned from a reference recording.
    pub async fn voice_clone(&self, job: VoiceCloneJob) -> StudioResult<GeneratedAudio> {
        let text = require_text(&job.text)?;
        let path = job.reference.as_deref().ok_or_else(|| {
            StudioError::InputValidation("reference audio is required for voice cloning".to_string())
        })?;
        let transcript = non_empty(job.reference_text.as_deref());
        if transcript.is_none() && !job.x_vector_only {
            debug!("No reference transcript; the model conditions on the audio alone");
        }
        let language = require_language(&job.language)?;
        let key = model_key(ModelFamily::Base, &job.size)?;
        let clip = load_reference(path)?;

        let request = SpeechRequest {
            text,
            language: Some(language.to_string()),
            reference: Some(ReferenceAudio { clip, transcript }),
            parameters: GenerationParameters {
                x_vector_only: job.x_vector_only,
                ..GenerationParameters::default()
            },
            ..SpeechRequest::default()
        };
        self.synthesize(&key, &request, "voice_clone").await
    }

    /// Speak with one of the expressive models.
    pub async fn expressive(&self, job: ExpressiveJob) -> StudioResult<GeneratedAudio> {
        let text = require_text(&job.text)?;
        let key = match job.model {
            ModelFamily::Turbo | ModelFamily::Standard | ModelFamily::Multilingual => {
                ModelKey::default_for(job.model)
            }
            other => {
                return Err(StudioError::InputValidation(format!(
                    "{other} is not an expressive model (use Turbo, Standard or Multilingual)"
                )));
            }
        };
        let language = match (job.model, non_empty(job.language.as_deref())) {
            (ModelFamily::Multilingual, Some(id)) if catalog::is_multilingual_language(&id) => {
                Some(id.to_lowercase())
            }
            (ModelFamily::Multilingual, Some(id)) => {
                return Err(StudioError::InputValidation(format!(
                    "unsupported language id '{id}' (available: {})",
                    catalog::MULTILINGUAL_LANGUAGE_IDS.join(", ")
                )));
            }
            (ModelFamily::Multilingual, None) => {
                return Err(StudioError::InputValidation(
                    "the multilingual model needs a language id".to_string(),
                ));
            }
            (_, language) => language,
        };
        validate_parameters(&job.parameters)?;
        let reference = job
            .reference
            .as_deref()
            .map(|path| load_reference(path).map(|clip| ReferenceAudio { clip, transcript: None }))
            .transpose()?;

        let request = SpeechRequest {
            text,
            language,
            reference,
            parameters: job.parameters,
            ..SpeechRequest::default()
        };
        let prefix = format!("{}", job.model).to_lowercase();
        self.synthesize(&key, &request, &prefix).await
    }

    /// Narrate long text sentence by sentence with the Standard model.
    ///
    /// `on_progress` is called after each segment.
    pub async fn narrate<F>(&self, job: NarrationJob, on_progress: F) -> StudioResult<GeneratedAudio>
    where
        F: FnMut(SegmentProgress<'_>),
    {
        require_text(&job.text)?;
        validate_parameters(&job.parameters)?;
        let segments = job.chunker().split(&job.text);
        if segments.total() == 0 {
            return Err(StudioError::InputValidation("text contains nothing to narrate".to_string()));
        }
        let reference = job
            .reference
            .as_deref()
            .map(|path| load_reference(path).map(|clip| ReferenceAudio { clip, transcript: None }))
            .transpose()?;

        let key = ModelKey::default_for(ModelFamily::Standard);
        let model = self.cache.acquire(&key).await?;
        let template = SpeechRequest { reference, parameters: job.parameters, ..SpeechRequest::default() };

        let mut narration = narration::narrate(&*model, segments, &template, on_progress)
            .await
            .map_err(|e| match e {
                NarrationError::NothingToNarrate => {
                    StudioError::InputValidation("text contains nothing to narrate".to_string())
                }
                NarrationError::Segment { index, total, source } => {
                    error!(key = %key, index, total, error = %source, "Narration segment failed");
                    StudioError::Generation { key: key.clone(), source }
                }
                NarrationError::Audio(e @ AudioError::SampleRateMismatch { .. }) => {
                    error!(key = %key, error = %e, "Narration segments disagree on sample rate");
                    StudioError::Generation {
                        key: key.clone(),
                        source: ModelError::GenerationError(e.to_string()),
                    }
                }
                NarrationError::Audio(e) => StudioError::Audio(e),
            })?;

        if template.parameters.normalize_loudness {
            audio::normalize_loudness(&mut narration.clip.samples);
        }
        self.write_output(&key, &narration.clip, "narration", narration.segments)
    }

    /// Release every resident model.
    ///
    /// # Returns
    /// The number of models released.
    pub async fn clear_memory(&self) -> usize {
        self.cache.clear().await
    }

    /// Models currently resident.
    pub async fn resident_keys(&self) -> BTreeSet<ModelKey> {
        self.cache.resident_keys().await
    }

    /// Cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn synthesize(
        &self,
        key: &ModelKey,
        request: &SpeechRequest,
        prefix: &str,
    ) -> StudioResult<GeneratedAudio> {
        let model = self.cache.acquire(key).await?;
        let mut clip = model.generate(request).await.map_err(|source| {
            error!(key = %key, error = %source, "Generation failed");
            StudioError::Generation { key: key.clone(), source }
        })?;
        if clip.is_empty() {
            warn!(key = %key, "Model returned no samples");
        }
        if request.parameters.normalize_loudness {
            audio::normalize_loudness(&mut clip.samples);
        }
        self.write_output(key, &clip, prefix, 1)
    }

    fn write_output(
        &self,
        key: &ModelKey,
        clip: &AudioClip,
        prefix: &str,
        segments: usize,
    ) -> StudioResult<GeneratedAudio> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{prefix}_{}.wav", Uuid::new_v4().simple()));
        audio::write_wav(&path, clip)?;

        let duration_secs = clip.duration().as_secs_f64();
        info!(key = %key, path = %path.display(), duration_secs, segments, "Wrote audio");
        Ok(GeneratedAudio {
            path,
            key: key.clone(),
            sample_rate: clip.sample_rate,
            duration_secs,
            segments,
        })
    }
}

fn require_text(text: &str) -> StudioResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StudioError::InputValidation("please enter some text".to_string()));
    }
    Ok(trimmed.to_string())
}

fn require_language(language: &str) -> StudioResult<&'static str> {
    catalog::find_language(language).ok_or_else(|| {
        StudioError::InputValidation(format!(
            "unsupported language '{language}' (available: {})",
            catalog::LANGUAGES.join(", ")
        ))
    })
}

fn model_key(family: ModelFamily, size: &str) -> StudioResult<ModelKey> {
    ModelKey::new(family, size).map_err(|e| StudioError::InputValidation(e.to_string()))
}

fn validate_parameters(parameters: &GenerationParameters) -> StudioResult<()> {
    parameters.validate().map_err(|e| match e {
        ModelError::InvalidInput(msg) => StudioError::InputValidation(msg),
        other => StudioError::InputValidation(other.to_string()),
    })
}

fn load_reference(path: &Path) -> StudioResult<AudioClip> {
    let clip = audio::read_wav(path).map_err(|e| {
        StudioError::InputValidation(format!("cannot read reference audio {}: {e}", path.display()))
    })?;
    if clip.is_empty() {
        return Err(StudioError::InputValidation(format!(
            "reference audio {} is empty",
            path.display()
        )));
    }
    Ok(clip)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::MockLoader;
    use async_trait::async_trait;
    use cantor_abstraction::{LoadTarget, ModelLoader, SpeechModel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn studio(dir: &TempDir) -> (Studio, Arc<MockLoader>) {
        let loader = Arc::new(MockLoader::new());
        let cache =
            SlotCache::new(CacheConfig::default(), Arc::clone(&loader) as Arc<dyn ModelLoader>)
                .unwrap();
        (Studio::new(Arc::new(cache), dir.path()), loader)
    }

    fn speak(text: &str) -> CustomVoiceJob {
        CustomVoiceJob {
            text: text.to_string(),
            speaker: "Uncle Fu".to_string(),
            language: "english".to_string(),
            instruct: Some("  ".to_string()),
            size: "0.6B".to_string(),
        }
    }

    #[tokio::test]
    async fn test_custom_voice_writes_file() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);

        let out = studio.custom_voice(speak("Hello there.")).await.unwrap();

        assert!(out.path.exists());
        assert!(out.path.starts_with(dir.path()));
        assert_eq!(out.key.to_string(), "CustomVoice_0.6B");
        assert_eq!(out.segments, 1);
        assert!(out.duration_secs > 0.0);
    }

    #[tokio::test]
    async fn test_each_request_gets_its_own_file() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);

        let a = studio.custom_voice(speak("One.")).await.unwrap();
        let b = studio.custom_voice(speak("One.")).await.unwrap();

        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn test_validation_errors_do_not_touch_cache() {
        let dir = TempDir::new().unwrap();
        let (studio, loader) = studio(&dir);

        let err = studio.custom_voice(speak("   ")).await.unwrap_err();
        assert!(err.is_validation());

        let mut job = speak("Hi");
        job.speaker = "Nobody".to_string();
        assert!(studio.custom_voice(job).await.unwrap_err().is_validation());

        let mut job = speak("Hi");
        job.size = "7B".to_string();
        assert!(studio.custom_voice(job).await.unwrap_err().is_validation());

        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_clone_requires_reference() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let job = VoiceCloneJob {
            text: "Say this.".to_string(),
            reference: None,
            reference_text: None,
            language: "Auto".to_string(),
            x_vector_only: true,
            size: "0.6B".to_string(),
        };

        let err = studio.voice_clone(job).await.unwrap_err();

        assert_eq!(err.kind(), "input_validation");
        assert!(err.to_string().contains("reference audio is required"));
    }

    #[tokio::test]
    async fn test_clone_with_reference() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let reference = dir.path().join("ref.wav");
        audio::write_wav(&reference, &AudioClip::new(vec![0.1; 2400], 16_000)).unwrap();

        let job = VoiceCloneJob {
            text: "Say this.".to_string(),
            reference: Some(reference),
            reference_text: Some("What I said.".to_string()),
            language: "Auto".to_string(),
            x_vector_only: false,
            size: "1.7B".to_string(),
        };
        let out = studio.voice_clone(job).await.unwrap();

        assert_eq!(out.key.to_string(), "Base_1.7B");
    }

    #[tokio::test]
    async fn test_expressive_rejects_non_expressive_family() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let job = ExpressiveJob {
            text: "Hi.".to_string(),
            model: ModelFamily::Base,
            reference: None,
            language: None,
            parameters: GenerationParameters::default(),
        };
        assert!(studio.expressive(job).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_multilingual_requires_known_language() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let mut job = ExpressiveJob {
            text: "Bonjour.".to_string(),
            model: ModelFamily::Multilingual,
            reference: None,
            language: Some("xx".to_string()),
            parameters: GenerationParameters::default(),
        };
        assert!(studio.expressive(job.clone()).await.unwrap_err().is_validation());

        job.language = Some("FR".to_string());
        let out = studio.expressive(job).await.unwrap();
        assert_eq!(out.key.to_string(), "Multilingual_500M");
    }

    #[tokio::test]
    async fn test_model_switch_keeps_single_resident() {
        let dir = TempDir::new().unwrap();
        let (studio, loader) = studio(&dir);

        studio.custom_voice(speak("One.")).await.unwrap();
        studio
            .voice_design(VoiceDesignJob {
                text: "Two.".to_string(),
                description: "A warm, professional voice.".to_string(),
                language: "Auto".to_string(),
            })
            .await
            .unwrap();

        let resident: Vec<String> =
            studio.resident_keys().await.iter().map(ToString::to_string).collect();
        assert_eq!(resident, vec!["VoiceDesign_1.7B"]);
        assert_eq!(loader.handles_for("CustomVoice_0.6B")[0].release_calls(), 1);

        assert_eq!(studio.clear_memory().await, 1);
        assert_eq!(studio.clear_memory().await, 0);
    }

    #[tokio::test]
    async fn test_load_failure_surfaces_as_model_load() {
        let dir = TempDir::new().unwrap();
        let (studio, loader) = studio(&dir);
        loader.fail_next(1);

        let err = studio.custom_voice(speak("Hello.")).await.unwrap_err();

        assert_eq!(err.kind(), "model_load");
        assert!(studio.resident_keys().await.is_empty());
        assert!(studio.custom_voice(speak("Hello.")).await.is_ok());
    }

    #[tokio::test]
    async fn test_narrate_reports_progress() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let job = NarrationJob {
            text: "Once upon a time.\nThere was a fox! The end?".to_string(),
            reference: None,
            parameters: GenerationParameters::default(),
            min_chars: 3,
            max_chars: None,
        };
        let mut steps = Vec::new();

        let out = studio.narrate(job, |p| steps.push((p.completed, p.total))).await.unwrap();

        assert_eq!(out.segments, 3);
        assert_eq!(steps, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(out.key.to_string(), "Standard_500M");
    }

    #[tokio::test]
    async fn test_narrate_rejects_punctuation_only() {
        let dir = TempDir::new().unwrap();
        let (studio, loader) = studio(&dir);
        let job = NarrationJob {
            text: ". ! ?".to_string(),
            reference: None,
            parameters: GenerationParameters::default(),
            min_chars: 3,
            max_chars: None,
        };
        assert!(studio.narrate(job, |_| {}).await.unwrap_err().is_validation());
        assert_eq!(loader.load_count(), 0);
    }

    fn peak(path: &Path) -> f32 {
        audio::read_wav(path).unwrap().samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[tokio::test]
    async fn test_normalize_loudness_changes_output_level() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let job = |normalize_loudness| ExpressiveJob {
            text: "Same words.".to_string(),
            model: ModelFamily::Turbo,
            reference: None,
            language: None,
            parameters: GenerationParameters { normalize_loudness, ..GenerationParameters::default() },
        };

        let raw = studio.expressive(job(false)).await.unwrap();
        let normalized = studio.expressive(job(true)).await.unwrap();

        assert!((peak(&raw.path) - 0.3).abs() < 0.01);
        assert!((peak(&normalized.path) - audio::LOUDNESS_TARGET_PEAK).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_clone_without_transcript() {
        let dir = TempDir::new().unwrap();
        let (studio, loader) = studio(&dir);
        let reference = dir.path().join("ref.wav");
        audio::write_wav(&reference, &AudioClip::new(vec![0.1; 2400], 16_000)).unwrap();

        let job = VoiceCloneJob {
            text: "Say this.".to_string(),
            reference: Some(reference),
            reference_text: None,
            language: "Auto".to_string(),
            x_vector_only: false,
            size: "0.6B".to_string(),
        };
        let out = studio.voice_clone(job).await.unwrap();

        assert_eq!(out.key.to_string(), "Base_0.6B");
        assert_eq!(loader.handles_for("Base_0.6B")[0].generate_calls(), 1);
    }

    /// Handle whose output rate drops after the first call.
    struct DriftingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechModel for DriftingModel {
        async fn generate(&self, request: &SpeechRequest) -> Result<AudioClip, ModelError> {
            let rate = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 { 24_000 } else { 16_000 };
            Ok(AudioClip::new(vec![0.2; request.text.len()], rate))
        }

        fn release(&self) -> Result<(), ModelError> {
            Ok(())
        }

        fn model_id(&self) -> &str {
            "Standard_500M"
        }

        fn sample_rate(&self) -> u32 {
            24_000
        }
    }

    struct DriftingLoader;

    #[async_trait]
    impl ModelLoader for DriftingLoader {
        async fn load(&self, _target: &LoadTarget) -> Result<Arc<dyn SpeechModel>, ModelError> {
            Ok(Arc::new(DriftingModel { calls: AtomicUsize::new(0) }))
        }

        fn name(&self) -> &str {
            "drifting"
        }
    }

    #[tokio::test]
    async fn test_narration_sample_rate_mismatch_is_generation_error() {
        let dir = TempDir::new().unwrap();
        let cache = SlotCache::new(CacheConfig::default(), Arc::new(DriftingLoader)).unwrap();
        let studio = Studio::new(Arc::new(cache), dir.path());
        let job = NarrationJob {
            text: "First part. Second part.".to_string(),
            reference: None,
            parameters: GenerationParameters::default(),
            min_chars: 3,
            max_chars: None,
        };

        let err = studio.narrate(job, |_| {}).await.unwrap_err();

        assert_eq!(err.kind(), "generation");
        assert!(matches!(
            err,
            StudioError::Generation { source: ModelError::GenerationError(ref msg), .. }
                if msg.contains("16000")
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_segment_count_matches_progress_total() {
        let dir = TempDir::new().unwrap();
        let (studio, _) = studio(&dir);
        let job = NarrationJob {
            text: "A short opening. Then a much longer sentence that has to be wrapped.".to_string(),
            reference: None,
            parameters: GenerationParameters::default(),
            min_chars: 3,
            max_chars: Some(30),
        };
        let expected = job.segment_count();
        let mut totals = Vec::new();

        studio.narrate(job, |p| totals.push(p.total)).await.unwrap();

        assert!(expected > 2);
        assert_eq!(totals, vec![expected; expected]);
    }

    #[test]
    fn test_job_from_toml() {
        #[derive(Deserialize)]
        struct Batch {
            jobs: Vec<Job>,
        }
        let batch: Batch = toml::from_str(
            r#"
            [[jobs]]
            kind = "speak"
            text = "Hello"

            [[jobs]]
            kind = "expressive"
            text = "Ha [laugh]"
            model = "Turbo"

            [jobs.parameters]
            temperature = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(batch.jobs.len(), 2);
        assert_eq!(batch.jobs[0].label(), "speak");
        match &batch.jobs[1] {
            Job::Expressive(job) => {
                assert!((job.parameters.temperature - 0.6).abs() < f32::EPSILON);
                assert_eq!(job.parameters.top_k, 1000);
            }
            other => panic!("unexpected job {}", other.label()),
        }
    }
}
