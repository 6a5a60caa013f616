//! Cantor CLI - command-line interface for the Cantor speech studio.
//!
//! This CLI provides a `cantor` command that generates speech with the
//! catalog models, keeping at most a configured number of them in memory.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::generate::{CloneArgs, DesignArgs, ExpressiveArgs, SpeakArgs};
use commands::narrate::NarrateArgs;
use commands::{batch, generate, models, narrate};
use config::{CliConfig, Overrides, Settings};

/// Cantor CLI - local text-to-speech studio
#[derive(Parser, Debug)]
#[command(
    name = "cantor",
    author,
    version,
    about = "Cantor - local text-to-speech studio",
    long_about = "Cantor generates speech with built-in speakers, designed voices, cloned voices and expressive models.\nModels are loaded on demand and evicted least-recently-used when the slot budget is reached."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file (skips ~/.cantor/config.toml and ./.cantorrc)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Deployment profile (cpu, gpu)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Number of models kept resident
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Directory for generated audio (default: system temp dir)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Directory holding local model snapshots
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Inference backend (mock)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak with a built-in speaker
    ///
    /// Uses the CustomVoice models. An optional instruction steers the
    /// delivery ("Speak with excitement").
    Speak(SpeakArgs),

    /// Speak in a voice built from a description
    Design(DesignArgs),

    /// Speak in a voice cloned from a reference recording
    Clone(CloneArgs),

    /// Speak with the Turbo, Standard or Multilingual models
    Expressive(ExpressiveArgs),

    /// Narrate a long text sentence by sentence
    Narrate(NarrateArgs),

    /// List available models, speakers and languages
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the jobs of a TOML file through one shared model cache
    Batch {
        /// Jobs file
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let cli_config = CliConfig::discover_and_load(args.config.as_deref())?;

    // Initialize tracing
    let level = args
        .log_level
        .as_deref()
        .or(cli_config.log_level.as_deref())
        .map_or(Level::INFO, parse_level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let overrides = Overrides {
        profile: args.profile,
        capacity: args.capacity,
        output_dir: args.output_dir,
        model_dir: args.model_dir,
        backend: args.backend,
    };
    let settings = Settings::resolve(overrides, cli_config)?;

    // Execute command
    match command {
        Command::Speak(cmd) => generate::speak(&settings, cmd).await?,
        Command::Design(cmd) => generate::design(&settings, cmd).await?,
        Command::Clone(cmd) => generate::clone(&settings, cmd).await?,
        Command::Expressive(cmd) => generate::expressive(&settings, cmd).await?,
        Command::Narrate(cmd) => narrate::execute(&settings, cmd).await?,
        Command::Models { json } => models::execute(json)?,
        Command::Batch { file, json } => batch::execute(&settings, file, json).await?,
    }

    Ok(())
}
