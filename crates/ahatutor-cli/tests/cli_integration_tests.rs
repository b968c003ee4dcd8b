//! CLI integration tests for ahatutor
//!
//! Runs the binary against the bundled genetics knowledge with no API key,
//! so every answer comes from curated data or degrades.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config, `.env` and API keys
#[allow(deprecated)]
fn ahatutor_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ahatutor").unwrap();
    cmd.current_dir(home.path())
        .env("AHATUTOR_CONFIG_DIR", home.path().join("config"))
        .env_remove("AHATUTOR_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_command() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("explore"))
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("quiz"));
}

#[test]
fn test_version_output() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ahatutor"));
}

#[test]
fn test_explore_prints_tree_and_path() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["explore", "Mendel's first law", "--depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mendel's first law\n  allele"))
        .stdout(predicate::str::contains("Learning path (6 steps):"))
        .stdout(predicate::str::contains("meiosis → Mendel's first law"));
}

#[test]
fn test_explore_quiet_prints_only_the_path() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["-q", "explore", "Mendel's first law", "-d", "1"])
        .assert()
        .success()
        .stdout(
            "allele → dominant → recessive → gamete → meiosis → Mendel's first law\n",
        );
}

#[test]
fn test_explore_json_output() {
    let home = TempDir::new().unwrap();
    let output = ahatutor_cmd(&home)
        .args(["explore", "Mendel's first law", "--depth", "0", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["tree"]["concept"], "Mendel's first law");
    assert_eq!(value["tree"]["level"], 0);
    assert_eq!(value["learningPath"], serde_json::json!(["Mendel's first law"]));
}

#[test]
fn test_explore_rejects_excessive_depth() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["explore", "gene", "--depth", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds the limit of 10"));
}

#[test]
fn test_path_skips_concepts_without_enrichment() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["path", "Mendel's first law", "--depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6. Mendel's first law - "))
        .stdout(predicate::str::contains("1. allele (not enriched)"))
        .stdout(predicate::str::contains("Skipped 5 concept(s):"));
}

#[test]
fn test_path_strict_aborts() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["path", "Mendel's first law", "--depth", "1", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Enrichment failed for 'allele'"));
}

#[test]
fn test_run_best_effort_reports_quiz_failure() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args([
            "run",
            "Mendel's first law",
            "--depth",
            "1",
            "--focus",
            "quiz",
            "--best-effort",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Domain: genetics"))
        .stdout(predicate::str::contains("Stage quiz failed"));
}

#[test]
fn test_run_abort_fails_on_quiz() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["run", "Mendel's first law", "-d", "1", "--focus", "quiz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline stage 'quiz' failed"));
}

#[test]
fn test_quiz_without_llm_fails_in_quiz_stage() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["quiz", "allele", "--count", "2", "--difficulty", "easy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline stage 'quiz' failed"));
}

#[test]
fn test_quiz_rejects_count_out_of_range() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["quiz", "allele", "-n", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("question count 11 must be between 1 and 10"));
}

#[test]
fn test_config_set_get_roundtrip() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["config", "set", "resolver.max_concurrency", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set resolver.max_concurrency = 4"));

    ahatutor_cmd(&home)
        .args(["config", "get", "resolver.max_concurrency"])
        .assert()
        .success()
        .stdout("4\n");

    assert!(home.path().join("config").join("config.toml").exists());
}

#[test]
fn test_config_rejects_invalid_value() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["config", "set", "resolver.max_concurrency", "0"])
        .assert()
        .failure();
}

#[test]
fn test_config_path_uses_override() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_doctor_command() {
    let home = TempDir::new().unwrap();
    ahatutor_cmd(&home)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("No API key"))
        .stdout(predicate::str::contains("Knowledge store: 16 concepts (genetics)"));
}
