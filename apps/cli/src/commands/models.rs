//! Models command implementation.

use anyhow::Result;
use cantor_models::catalog::{self, ModelFamily, ModelKey};
use colored::Colorize;
use serde_json::json;

/// Every model in the catalog.
fn catalog_keys() -> Vec<ModelKey> {
    ModelFamily::ALL
        .iter()
        .flat_map(|family| {
            family.variants().iter().filter_map(|variant| ModelKey::new(*family, variant).ok())
        })
        .collect()
}

/// Execute `cantor models`.
pub fn execute(json_output: bool) -> Result<()> {
    let keys = catalog_keys();

    if json_output {
        let models: Vec<_> = keys
            .iter()
            .map(|key| {
                json!({
                    "key": key.to_string(),
                    "family": key.family().as_str(),
                    "variant": key.variant(),
                    "repo_id": key.repo_id(),
                    "description": key.family().description(),
                })
            })
            .collect();
        let listing = json!({
            "models": models,
            "speakers": catalog::SPEAKERS,
            "languages": catalog::LANGUAGES,
            "multilingual_language_ids": catalog::MULTILINGUAL_LANGUAGE_IDS,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Available Models ({})", keys.len()).bold().cyan());
    println!();
    println!("{:<20} {:<38} {}", "Key", "Repository", "Description");
    println!("{}", "─".repeat(100));
    for key in &keys {
        println!(
            "{:<20} {:<38} {}",
            key.to_string().cyan(),
            key.repo_id().dimmed(),
            key.family().description()
        );
    }
    println!();
    println!("  {} {}", "Speakers:".bold(), catalog::SPEAKERS.join(", "));
    println!("  {} {}", "Languages:".bold(), catalog::LANGUAGES.join(", "));
    println!("  {} {}", "Multilingual ids:".bold(), catalog::MULTILINGUAL_LANGUAGE_IDS.join(", "));
    println!("  {} {}", "Turbo tags:".bold(), catalog::PARALINGUISTIC_TAGS.join(" "));
    println!();

    Ok(())
}
