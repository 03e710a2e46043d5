//! Integration tests for singlerun-cli
//!
//! These tests run the built binary against definitions in a temporary
//! directory:
//! - Template generation
//! - YAML validation
//! - Plan rendering
//! - Runs with a persistent state file

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Helper function to create a test directory
fn create_test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Helper function to write a valid definition with one unit of each kind
fn create_example_yaml(dir: &Path) -> PathBuf {
    let path = dir.join("hooks.yaml");
    let yaml_content = r#"name: deploy-hooks
description: Post-deploy tasks
tenant: acme
timeout_secs: 60
units:
  - name: notify-deploy
  - name: seed-database
    idempotent: true
"#;
    fs::write(&path, yaml_content).expect("Failed to write YAML file");
    path
}

fn singlerun(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_singlerun"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("SINGLERUN_TENANT")
        .env_remove("SINGLERUN_PLAN_TIMEOUT_SECS")
        .env_remove("SINGLERUN_STATE_FILE")
        .env_remove("SINGLERUN_SCHEDULE_RATE_MINUTES")
        .output()
        .expect("Failed to run singlerun")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_init_writes_valid_template() {
    let temp_dir = create_test_dir();
    let path = temp_dir.path().join("hooks.yaml");
    let path_str = path.to_str().unwrap();

    let output = singlerun(&["init", "deploy-hooks", "--path", path_str]);
    assert!(output.status.success(), "{}", stderr(&output));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("name: deploy-hooks"));
    assert!(content.contains("idempotent: true"));

    let output = singlerun(&["validate", path_str]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("✓ Definition is valid"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = singlerun(&["init", "other", "--path", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(fs::read_to_string(&path).unwrap().contains("deploy-hooks"));
}

#[test]
fn test_validate_lists_units() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = singlerun(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("Plan name: deploy-hooks"));
    assert!(out.contains("Tenant: acme"));
    assert!(out.contains("- notify-deploy (every run)"));
    assert!(out.contains("- seed-database (run-once)"));
}

#[test]
fn test_validate_rejects_duplicates() {
    let temp_dir = create_test_dir();
    let path = temp_dir.path().join("dup.yaml");
    fs::write(
        &path,
        "name: dup\ntenant: acme\nunits:\n  - name: a\n  - name: a\n",
    )
    .unwrap();

    let output = singlerun(&["validate", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Duplicate unit name: a"));
}

#[test]
fn test_plan_formats() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());
    let path_str = path.to_str().unwrap();

    let ascii = singlerun(&["plan", path_str]);
    assert!(ascii.status.success());
    assert!(stdout(&ascii).contains("<seed-database succeeded?>"));

    let mermaid = singlerun(&["plan", path_str, "--format", "mermaid"]);
    assert!(stdout(&mermaid).contains("graph TD"));

    let dot = singlerun(&["plan", path_str, "--format", "dot"]);
    assert!(stdout(&dot).contains("digraph G"));

    let states = singlerun(&["plan", path_str, "--format", "states"]);
    let doc: serde_json::Value = serde_json::from_str(&stdout(&states)).unwrap();
    assert_eq!(doc["StartAt"], "Start");
    assert_eq!(doc["Comment"], "deploy-hooks");
    assert_eq!(doc["States"]["Check seed-database"]["ResultPath"], "$.seed-database");

    let unknown = singlerun(&["plan", path_str, "--format", "svg"]);
    assert!(!unknown.status.success());
}

#[test]
fn test_second_run_skips_run_once_unit() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());
    let state = temp_dir.path().join("state.json");
    let args = [
        "run",
        path.to_str().unwrap(),
        "--state-file",
        state.to_str().unwrap(),
    ];

    let first = singlerun(&args);
    assert!(first.status.success(), "{}", stderr(&first));
    let out = stdout(&first);
    assert!(out.contains("2 invoked, 0 skipped"));
    assert!(out.contains("invoked  seed-database"));

    let second = singlerun(&args);
    assert!(second.status.success(), "{}", stderr(&second));
    let out = stdout(&second);
    assert!(out.contains("1 invoked, 1 skipped"));
    assert!(out.contains("invoked  notify-deploy"));
    assert!(out.contains("skipped  seed-database"));

    let markers = fs::read_to_string(&state).unwrap();
    assert!(markers.contains("\"tenant\": \"acme\""));
}

#[test]
fn test_tenant_override_gets_own_markers() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());
    let state = temp_dir.path().join("state.json");
    let path_str = path.to_str().unwrap();
    let state_str = state.to_str().unwrap();

    assert!(singlerun(&["run", path_str, "--state-file", state_str]).status.success());

    let output = singlerun(&["run", path_str, "--state-file", state_str, "--tenant", "globex"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("for tenant 'globex': 2 invoked, 0 skipped"));
}

#[test]
fn test_failed_unit_stops_run_and_leaves_no_marker() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());
    let state = temp_dir.path().join("state.json");
    let path_str = path.to_str().unwrap();
    let state_str = state.to_str().unwrap();

    let output = singlerun(&[
        "run",
        path_str,
        "--state-file",
        state_str,
        "--fail",
        "seed-database",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("forced to fail"));

    // notify-deploy wrote its marker; seed-database did not
    let markers = fs::read_to_string(&state).unwrap();
    assert!(markers.contains("notify-deploy"));
    assert!(!markers.contains("seed-database"));

    let retry = singlerun(&["run", path_str, "--state-file", state_str]);
    assert!(stdout(&retry).contains("invoked  seed-database"));
}

#[test]
fn test_fail_flag_must_name_a_unit() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = singlerun(&["run", path.to_str().unwrap(), "--fail", "nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown unit 'nope'"));
}

#[test]
fn test_run_json_report() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = singlerun(&["run", path.to_str().unwrap(), "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["plan"], "deploy-hooks");
    assert_eq!(report["tenant"], "acme");
    assert_eq!(report["units"][0]["unit"], "notify-deploy");
    assert_eq!(report["units"][0]["outcome"], "invoked");
}

#[test]
fn test_environment_overrides_definition() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_singlerun"))
        .args(["run", path.to_str().unwrap()])
        .env("RUST_LOG", "warn")
        .env("SINGLERUN_TENANT", "initech")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("for tenant 'initech'"));

    let output = Command::new(env!("CARGO_BIN_EXE_singlerun"))
        .args(["run", path.to_str().unwrap()])
        .env("RUST_LOG", "warn")
        .env("SINGLERUN_PLAN_TIMEOUT_SECS", "0")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_watch_requires_schedule() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let output = singlerun(&["run", path.to_str().unwrap(), "--watch"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--watch needs a schedule"));
}

#[test]
fn test_watch_runs_then_waits_on_schedule() {
    let temp_dir = create_test_dir();
    let path = create_example_yaml(temp_dir.path());

    let mut child = Command::new(env!("CARGO_BIN_EXE_singlerun"))
        .args(["run", path.to_str().unwrap(), "--watch"])
        .env("RUST_LOG", "warn")
        .env("SINGLERUN_SCHEDULE_RATE_MINUTES", "30")
        .env_remove("SINGLERUN_TENANT")
        .env_remove("SINGLERUN_PLAN_TIMEOUT_SECS")
        .env_remove("SINGLERUN_STATE_FILE")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start singlerun");

    let stdout = child.stdout.take().unwrap();
    let lines: Vec<String> = BufReader::new(stdout)
        .lines()
        .map(|line| line.unwrap())
        .take_while(|line| !line.starts_with("Watching"))
        .collect();

    child.kill().unwrap();
    child.wait().unwrap();

    assert!(lines.iter().any(|line| line.contains("2 invoked, 0 skipped")));
}
