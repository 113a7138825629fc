use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const KEY_VARS: [&str; 4] = [
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "SERPAPI_API_KEY",
    "SERP_API_KEY",
];

/// `itinera` run inside `dir` with no provider keys in the environment and
/// `dir` as the home directory.
fn itinera(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("itinera").unwrap();
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    for var in KEY_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    itinera(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_show_redacts_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip.yaml");
    fs::write(
        &path,
        "gateway:\n  port: 9100\nproviders:\n  gemini:\n    api_key: super-secret\n",
    )
    .unwrap();

    itinera(&dir)
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 9100"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn test_config_show_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    itinera(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 8766"))
        .stdout(predicate::str::contains("heartbeat_interval_secs: 5"));
}

#[test]
fn test_config_path_finds_local_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("itinera.json"), "{}").unwrap();

    itinera(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("itinera.json"));
}

#[test]
fn test_config_path_without_file() {
    let dir = TempDir::new().unwrap();
    itinera(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No configuration file found"));
}

#[test]
fn test_serve_requires_provider_keys() {
    let dir = TempDir::new().unwrap();
    itinera(&dir)
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key required"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    itinera(&dir)
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
