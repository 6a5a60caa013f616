//! Command implementations for the Cantor CLI.

pub mod batch;
pub mod generate;
pub mod models;
pub mod narrate;

use anyhow::Result;
use cantor_models::{GeneratedAudio, ModelKey};
use colored::Colorize;
use std::collections::BTreeSet;

/// Print one generated file as JSON or a human summary.
pub(crate) fn print_generated(out: &GeneratedAudio, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(out)?);
        return Ok(());
    }

    println!("{} {}", "✓".green(), out.path.display().to_string().bold());
    println!(
        "  {} {}  {} {:.2}s  {} {} Hz",
        "model".dimmed(),
        out.key.to_string().cyan(),
        "duration".dimmed(),
        out.duration_secs,
        "rate".dimmed(),
        out.sample_rate
    );
    if out.segments > 1 {
        println!("  {} {}", "segments".dimmed(), out.segments);
    }
    Ok(())
}

/// Comma separated list of resident keys.
pub(crate) fn format_resident(keys: &BTreeSet<ModelKey>) -> String {
    if keys.is_empty() {
        return "(none)".to_string();
    }
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
