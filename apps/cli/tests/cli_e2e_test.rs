//! End-to-end tests for the `cantor` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// A `cantor` command isolated from the user's config files.
fn cantor(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cantor").unwrap();
    cmd.current_dir(home.path()).env("HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}

fn wav_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "wav"))
                .count()
        })
        .unwrap_or(0)
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    cantor(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("speak"))
        .stdout(predicate::str::contains("narrate"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_models_json() {
    let home = TempDir::new().unwrap();
    let assert = cantor(&home).args(["models", "--json"]).assert().success();
    let json = json_stdout(assert.get_output());

    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 8);
    assert!(models.iter().any(|m| {
        m["key"] == "CustomVoice_0.6B" && m["repo_id"] == "Qwen/Qwen3-TTS-12Hz-0.6B-CustomVoice"
    }));
    assert!(json["speakers"].as_array().unwrap().iter().any(|s| s == "Vivian"));
}

#[test]
fn test_speak_writes_wav() {
    let home = TempDir::new().unwrap();
    let out_dir = home.path().join("out");

    let assert = cantor(&home)
        .args(["speak", "Hello from the studio.", "--speaker", "uncle fu", "--json", "--output-dir"])
        .arg(&out_dir)
        .assert()
        .success();
    let json = json_stdout(assert.get_output());

    assert_eq!(json["key"], "CustomVoice_0.6B");
    assert_eq!(json["segments"], 1);
    assert!(Path::new(json["path"].as_str().unwrap()).exists());
    assert_eq!(wav_files(&out_dir), 1);
}

#[test]
fn test_empty_text_is_rejected() {
    let home = TempDir::new().unwrap();
    cantor(&home)
        .args(["speak", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("please enter some text"));
}

#[test]
fn test_clone_requires_reference() {
    let home = TempDir::new().unwrap();
    cantor(&home)
        .args(["clone", "Say this.", "--x-vector-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reference audio is required"));
}

#[test]
fn test_unknown_speaker_is_rejected() {
    let home = TempDir::new().unwrap();
    cantor(&home)
        .args(["speak", "Hi.", "--speaker", "Nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown speaker 'Nobody'"));
}

#[test]
fn test_narrate_from_file() {
    let home = TempDir::new().unwrap();
    let story = home.path().join("story.txt");
    std::fs::write(&story, "Once upon a time.\nA fox lived in the woods! Did it?").unwrap();
    let out_dir = home.path().join("out");

    let assert = cantor(&home)
        .args(["narrate", "--json", "--input"])
        .arg(&story)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success();
    let json = json_stdout(assert.get_output());

    assert_eq!(json["key"], "Standard_500M");
    assert_eq!(json["segments"], 3);
    assert_eq!(wav_files(&out_dir), 1);
}

#[test]
fn test_local_config_supplies_defaults() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join(".cantorrc"), "[defaults]\nspeaker = \"Nobody\"\n").unwrap();

    cantor(&home)
        .args(["speak", "Hi."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown speaker 'Nobody'"));

    cantor(&home).args(["speak", "Hi.", "--speaker", "Ryan"]).assert().success();
}

#[test]
fn test_zero_capacity_is_rejected() {
    let home = TempDir::new().unwrap();
    cantor(&home)
        .args(["speak", "Hi.", "--capacity", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid cache configuration"));
}

#[test]
fn test_missing_snapshot_reports_load_failure() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models");
    std::fs::create_dir_all(&models).unwrap();

    cantor(&home)
        .args(["expressive", "Hello.", "--model", "turbo", "--model-dir"])
        .arg(&models)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no local snapshot of ResembleAI/chatterbox-turbo"));
}

#[test]
fn test_batch_continues_after_failure() {
    let home = TempDir::new().unwrap();
    let jobs = home.path().join("jobs.toml");
    std::fs::write(
        &jobs,
        r#"
        [[jobs]]
        kind = "speak"
        text = "First."

        [[jobs]]
        kind = "clone"
        text = "No reference given."

        [[jobs]]
        kind = "design"
        text = "Third."
        description = "A calm, low voice"

        [[jobs]]
        kind = "expressive"
        text = "Bonjour."
        model = "Multilingual"
        language = "fr"
        "#,
    )
    .unwrap();
    let out_dir = home.path().join("out");

    let assert = cantor(&home)
        .args(["batch", "--json"])
        .arg(&jobs)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 4 job(s) failed"));
    let json = json_stdout(assert.get_output());

    let reports = json["jobs"].as_array().unwrap();
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[1]["ok"], false);
    assert_eq!(reports[1]["error_kind"], "input_validation");
    for report in reports {
        assert!(report["resident"].as_array().unwrap().len() <= 1);
    }
    assert_eq!(reports[3]["resident"][0], "Multilingual_500M");
    assert_eq!(json["released"], 1);
    assert_eq!(wav_files(&out_dir), 3);
}

#[test]
fn test_batch_with_gpu_profile_keeps_models_resident() {
    let home = TempDir::new().unwrap();
    let jobs = home.path().join("jobs.toml");
    std::fs::write(
        &jobs,
        r#"
        [[jobs]]
        kind = "speak"
        text = "One."

        [[jobs]]
        kind = "design"
        text = "Two."
        description = "Bright and quick"
        "#,
    )
    .unwrap();

    let assert = cantor(&home)
        .args(["batch", "--json", "--profile", "gpu"])
        .arg(&jobs)
        .arg("--output-dir")
        .arg(home.path())
        .assert()
        .success();
    let json = json_stdout(assert.get_output());

    assert_eq!(json["jobs"][1]["resident"].as_array().unwrap().len(), 2);
    assert_eq!(json["stats"]["total_evictions"], 0);
}
