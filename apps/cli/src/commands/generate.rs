//! Single-request generation commands: speak, design, clone and expressive.

use super::print_generated;
use crate::config::Settings;
use anyhow::{Context, Result};
use cantor_abstraction::GenerationParameters;
use cantor_models::{CustomVoiceJob, ExpressiveJob, ModelFamily, VoiceCloneJob, VoiceDesignJob};
use clap::Args;
use std::path::PathBuf;
use std::str::FromStr;

/// Arguments for `cantor speak`.
#[derive(Args, Debug)]
pub struct SpeakArgs {
    /// Text to speak
    pub text: String,

    /// Built-in speaker (e.g. Ryan, Vivian, "Uncle Fu")
    #[arg(short, long)]
    pub speaker: Option<String>,

    /// Language (e.g. Auto, English, Chinese)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Style instruction (e.g. "Speak slowly and calmly")
    #[arg(short, long)]
    pub instruct: Option<String>,

    /// Model size (0.6B, 1.7B)
    #[arg(long)]
    pub size: Option<String>,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `cantor design`.
#[derive(Args, Debug)]
pub struct DesignArgs {
    /// Text to speak
    pub text: String,

    /// Description of the voice
    #[arg(short, long)]
    pub description: String,

    /// Language (e.g. Auto, English)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `cantor clone`.
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Text to speak
    pub text: String,

    /// WAV file with the voice to clone
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Transcript of the reference recording
    #[arg(short = 't', long)]
    pub reference_text: Option<String>,

    /// Clone from the speaker embedding only (no transcript needed)
    #[arg(long)]
    pub x_vector_only: bool,

    /// Language (e.g. Auto, English)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Model size (0.6B, 1.7B)
    #[arg(long)]
    pub size: Option<String>,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Sampling flags shared by the expressive models.
#[derive(Args, Debug, Default)]
pub struct SamplingArgs {
    /// Emotional exaggeration (0.25 - 2.0)
    #[arg(long)]
    pub exaggeration: Option<f32>,

    /// Pace / CFG weight (0.1 - 1.0)
    #[arg(long)]
    pub cfg_weight: Option<f32>,

    /// Sampling temperature (0.05 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Random seed (0 leaves the engine unseeded)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Nucleus sampling mass (0.0 - 1.0)
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff
    #[arg(long)]
    pub top_k: Option<u32>,

    /// Repetition penalty (1.0 - 2.0)
    #[arg(long)]
    pub repetition_penalty: Option<f32>,

    /// Minimum token probability relative to the best token (0.0 - 1.0)
    #[arg(long)]
    pub min_p: Option<f32>,

    /// Keep the raw output level instead of normalizing loudness
    #[arg(long)]
    pub no_normalize: bool,
}

impl SamplingArgs {
    /// Apply the flags over the default parameters.
    pub fn parameters(&self) -> GenerationParameters {
        let mut params = GenerationParameters::default();
        if let Some(exaggeration) = self.exaggeration {
            params.exaggeration = exaggeration;
        }
        if let Some(cfg_weight) = self.cfg_weight {
            params.cfg_weight = cfg_weight;
        }
        if let Some(temperature) = self.temperature {
            params.temperature = temperature;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        if let Some(top_p) = self.top_p {
            params.top_p = top_p;
        }
        if let Some(top_k) = self.top_k {
            params.top_k = top_k;
        }
        if let Some(repetition_penalty) = self.repetition_penalty {
            params.repetition_penalty = repetition_penalty;
        }
        if let Some(min_p) = self.min_p {
            params.min_p = min_p;
        }
        params.normalize_loudness = !self.no_normalize;
        params
    }
}

/// Arguments for `cantor expressive`.
#[derive(Args, Debug)]
pub struct ExpressiveArgs {
    /// Text to speak (Turbo understands tags such as [laugh] or [sigh])
    pub text: String,

    /// Model (turbo, standard, multilingual)
    #[arg(short, long, default_value = "turbo")]
    pub model: String,

    /// Optional WAV file with a voice reference
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Language id for the multilingual model (e.g. fr, de, ja)
    #[arg(short, long)]
    pub language: Option<String>,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute `cantor speak`.
pub async fn speak(settings: &Settings, args: SpeakArgs) -> Result<()> {
    let studio = settings.studio()?;
    let job = CustomVoiceJob {
        text: args.text,
        speaker: settings.speaker(args.speaker),
        language: settings.language(args.language),
        instruct: args.instruct,
        size: settings.size(args.size),
    };
    let out = studio.custom_voice(job).await?;
    print_generated(&out, args.json)
}

/// Execute `cantor design`.
pub async fn design(settings: &Settings, args: DesignArgs) -> Result<()> {
    let studio = settings.studio()?;
    let job = VoiceDesignJob {
        text: args.text,
        description: args.description,
        language: settings.language(args.language),
    };
    let out = studio.voice_design(job).await?;
    print_generated(&out, args.json)
}

/// Execute `cantor clone`.
pub async fn clone(settings: &Settings, args: CloneArgs) -> Result<()> {
    let studio = settings.studio()?;
    let job = VoiceCloneJob {
        text: args.text,
        reference: args.reference,
        reference_text: args.reference_text,
        language: settings.language(args.language),
        x_vector_only: args.x_vector_only,
        size: settings.size(args.size),
    };
    let out = studio.voice_clone(job).await?;
    print_generated(&out, args.json)
}

/// Execute `cantor expressive`.
pub async fn expressive(settings: &Settings, args: ExpressiveArgs) -> Result<()> {
    let model = ModelFamily::from_str(&args.model)
        .with_context(|| format!("Unknown model '{}'", args.model))?;
    let studio = settings.studio()?;
    let job = ExpressiveJob {
        text: args.text,
        model,
        reference: args.reference,
        language: args.language,
        parameters: args.sampling.parameters(),
    };
    let out = studio.expressive(job).await?;
    print_generated(&out, args.json)
}
