//! Batch command implementation.
//!
//! Runs every job of a TOML file in order through one studio, so all jobs
//! share the same slot cache. A failing job is reported and the batch moves
//! on.

use super::{format_resident, print_generated};
use crate::config::Settings;
use anyhow::{Context, Result, bail};
use cantor_models::{Job, Studio};
use colored::Colorize;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Jobs file layout.
#[derive(Debug, Deserialize)]
pub struct BatchFile {
    /// Jobs, run in order.
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl BatchFile {
    /// Parse a jobs file. Relative reference paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read jobs file: {}", path.display()))?;
        let mut batch: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse jobs file: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for job in &mut batch.jobs {
            resolve_reference(job, base);
        }
        Ok(batch)
    }
}

fn resolve_reference(job: &mut Job, base: &Path) {
    let reference: Option<&mut PathBuf> = match job {
        Job::Clone(job) => job.reference.as_mut(),
        Job::Expressive(job) => job.reference.as_mut(),
        Job::Narrate(job) => job.reference.as_mut(),
        Job::Speak(_) | Job::Design(_) => None,
    };
    if let Some(path) = reference
        && path.is_relative()
    {
        *path = base.join(&*path);
    }
}

/// Execute `cantor batch`.
pub async fn execute(settings: &Settings, file: PathBuf, json_output: bool) -> Result<()> {
    let batch = BatchFile::load(&file)?;
    if batch.jobs.is_empty() {
        bail!("No jobs found in {}", file.display());
    }
    let studio = settings.studio()?;
    let total = batch.jobs.len();

    if !json_output {
        println!("{}", format!("Running {total} job(s)").bold().cyan());
        println!();
    }

    let mut reports = Vec::with_capacity(total);
    let mut failed = 0;
    for (index, job) in batch.jobs.into_iter().enumerate() {
        let report = run_job(&studio, index + 1, total, job, json_output).await?;
        if !report["ok"].as_bool().unwrap_or(false) {
            failed += 1;
        }
        reports.push(report);
    }

    let stats = studio.stats().await;
    let released = studio.clear_memory().await;

    if json_output {
        let summary = json!({
            "jobs": reports,
            "failed": failed,
            "released": released,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "{} {} succeeded, {} failed; released {} model(s) ({} loads, {} evictions)",
            "Done:".bold(),
            (total - failed).to_string().green(),
            failed.to_string().red(),
            released,
            stats.total_loads,
            stats.total_evictions
        );
    }

    if failed > 0 {
        bail!("{failed} of {total} job(s) failed");
    }
    Ok(())
}

async fn run_job(
    studio: &Studio,
    index: usize,
    total: usize,
    job: Job,
    json_output: bool,
) -> Result<serde_json::Value> {
    let label = job.label();
    if !json_output {
        println!("{} {}", format!("[{index}/{total}]").dimmed(), label.bold());
    }

    let result = studio.run(job).await;
    let resident = studio.resident_keys().await;

    let report = match result {
        Ok(out) => {
            if !json_output {
                print_generated(&out, false)?;
            }
            json!({
                "index": index,
                "kind": label,
                "ok": true,
                "output": out,
                "resident": resident,
            })
        }
        Err(e) => {
            if !json_output {
                println!("{} {}", "✗".red(), e.to_string().red());
            }
            json!({
                "index": index,
                "kind": label,
                "ok": false,
                "error": e.to_string(),
                "error_kind": e.kind(),
                "resident": resident,
            })
        }
    };

    if !json_output {
        println!("  {} {}", "resident".dimmed(), format_resident(&resident));
    }
    Ok(report)
}
