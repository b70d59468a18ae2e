//! CLI integration tests for the mathcast command-line interface.
//!
//! None of these reach a model or an external tool: they cover argument
//! parsing, config handling and the run bookkeeping commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A mathcast command isolated from the user's config and working directory.
fn mathcast(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mathcast").unwrap();
    cmd.current_dir(home.path())
        .env("MATHCAST_CONFIG_DIR", home.path().join("config"))
        .env_remove("OPENAI_API_KEY");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("purge"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mathcast"));
}

#[test]
fn test_generate_help_shows_options() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--image"))
        .stdout(predicate::str::contains("--variant"))
        .stdout(predicate::str::contains("--force-restart"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_generate_rejects_unknown_variant() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["generate", "x = 1", "--variant", "gif"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gif"));
}

#[test]
fn test_generate_rejects_empty_problem() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .arg("generate")
        .write_stdin("   \n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("problem text is empty"));
}

#[test]
fn test_generate_without_llm_config_fails() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["generate", "2x + 3 = 7", "--output", "runs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[llm]"));
}

#[test]
fn test_status_requires_run_id() {
    let home = TempDir::new().unwrap();
    mathcast(&home).arg("status").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Run Bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_status_unknown_run() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["status", "missing-run", "--output", "runs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-run"));
}

#[test]
fn test_status_reports_recorded_run() {
    let home = TempDir::new().unwrap();
    let run_dir = home.path().join("runs/demo");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(
        run_dir.join("run.json"),
        r#"{"run_id":"demo","problem_text":"x + 1 = 2","variant":"html","created_at":"2026-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    mathcast(&home)
        .args(["--json", "status", "demo", "--output", "runs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"last_completed_stage\": -1"))
        .stdout(predicate::str::contains("Analyze"));
}

#[test]
fn test_purge_run() {
    let home = TempDir::new().unwrap();
    let run_dir = home.path().join("runs/old-run");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(run_dir.join("run.json"), "{}").unwrap();

    mathcast(&home)
        .args(["purge", "old-run", "--output", "runs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    assert!(!run_dir.exists());

    mathcast(&home)
        .args(["--json", "purge", "old-run", "--output", "runs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"removed\": false"));
}

#[test]
fn test_purge_rejects_path_like_id() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["purge", "../escape", "--output", "runs"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_show() {
    let home = TempDir::new().unwrap();
    mathcast(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    assert!(home.path().join("config/config.toml").is_file());

    mathcast(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gpt-4o"))
        .stdout(predicate::str::contains("[key: missing]"));
}

#[test]
fn test_project_config_overrides_and_redacts() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("mathcast.toml"),
        "[llm]\nbackend = \"groq\"\nmodel = \"local-model\"\napi_key = \"plaintext-secret\"\n",
    )
    .unwrap();

    mathcast(&home)
        .args(["--json", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local-model"))
        .stdout(predicate::str::contains("plaintext-secret").not());
}

#[test]
fn test_config_path_uses_config_dir_flag() {
    let home = TempDir::new().unwrap();
    let custom = home.path().join("elsewhere");
    mathcast(&home)
        .args(["--config-dir", custom.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));
}
