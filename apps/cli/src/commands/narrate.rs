//! Narrate command implementation.
//!
//! Reads a story from the command line or a file and narrates it sentence by
//! sentence, with a progress bar on stderr.

use super::generate::SamplingArgs;
use super::print_generated;
use crate::config::Settings;
use anyhow::{Context, Result, bail};
use cantor_models::NarrationJob;
use cantor_models::chunker::DEFAULT_MIN_CHARS;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Arguments for `cantor narrate`.
#[derive(Args, Debug)]
pub struct NarrateArgs {
    /// Story text (use --input to read from a file)
    pub text: Option<String>,

    /// Read the story from a file
    #[arg(short, long, conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Optional WAV file with a voice reference
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Drop punctuation-only segments shorter than this
    #[arg(long, default_value_t = DEFAULT_MIN_CHARS)]
    pub min_chars: usize,

    /// Split sentences longer than this at word boundaries
    #[arg(long)]
    pub max_chars: Option<usize>,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute `cantor narrate`.
pub async fn execute(settings: &Settings, args: NarrateArgs) -> Result<()> {
    let text = match (args.text, &args.input) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read story from {}", path.display()))?,
        (None, None) => bail!("Provide the story text or --input <file>"),
    };

    let studio = settings.studio()?;
    let job = NarrationJob {
        text,
        reference: args.reference,
        parameters: args.sampling.parameters(),
        min_chars: args.min_chars,
        max_chars: args.max_chars,
    };

    let total = job.segment_count() as u64;
    let bar = if args.json { ProgressBar::hidden() } else { ProgressBar::new(total) };
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );

    let result = studio
        .narrate(job, |progress| {
            bar.set_position(progress.completed as u64);
            bar.set_message(preview(progress.text));
        })
        .await;
    bar.finish_and_clear();

    print_generated(&result?, args.json)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(LIMIT).collect();
    format!("{cut}...")
}
