//! CLI integration tests for the carlink command-line interface.
//!
//! These tests cover help output, argument parsing and the commands that
//! work offline against a temporary config directory.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the carlink binary with an isolated config directory.
fn carlink(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("carlink").unwrap();
    cmd.env("CARLINK_CONFIG_DIR", config_dir);
    cmd
}

const CONFIG: &str = r#"
[account.home]
brand = "volkswagen"
username = "me@example.com"
password = "hunter2"

[vehicle.golf]
account = "home"
vin = "WVWZZZ1KZAW000001"
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("connected vehicle services"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("actions"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("carlink"));
}

#[test]
fn test_actions_help_lists_actions() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["actions", "send", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("climate-start"))
        .stdout(predicate::str::contains("window-heating-stop"))
        .stdout(predicate::str::contains("ventilation-start"))
        .stdout(predicate::str::contains("--minutes"))
        .stdout(predicate::str::contains("--heater-source"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_action_rejected() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["actions", "send", "self-destruct"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_set_temperature_requires_value() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["actions", "send", "set-temperature"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--temperature"));
}

#[test]
fn test_target_level_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["actions", "send", "set-target-level", "--level", "120"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path()).arg("auth").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_show_redacts_secrets() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), CONFIG).unwrap();
    carlink(dir.path())
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WVWZZZ1KZAW000001"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_init_creates_template() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_auth_status_reports_secret_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), CONFIG).unwrap();
    carlink(dir.path())
        .args(["auth", "status"])
        .env_remove("CARLINK_HOME_PASSWORD")
        .env_remove("CARLINK_GOLF_PIN")
        .assert()
        .success()
        .stdout(predicate::str::contains("home"))
        .stdout(predicate::str::contains("config file"))
        .stdout(predicate::str::contains("S-PIN: not configured"));
}

#[test]
fn test_actions_without_vehicles_fail() {
    let dir = tempfile::tempdir().unwrap();
    carlink(dir.path())
        .args(["actions", "send", "lock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No vehicles configured"));
}
