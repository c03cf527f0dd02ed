//! Integration tests for the proxybar binary's one-shot subcommands.

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn proxybar(settings: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_proxybar"))
        .arg("--settings")
        .arg(settings)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run proxybar")
}

fn show(settings: &Path) -> Value {
    let output = proxybar(settings, &["config", "show"]);
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).expect("config show prints JSON")
}

#[test]
fn test_config_show_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings = show(&temp_dir.path().join("settings.json"));

    assert_eq!(settings["port"], 8080);
    assert_eq!(settings["auto_start"], true);
}

#[test]
fn test_config_set_port_and_auto_start() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");

    assert!(proxybar(&path, &["config", "set-port", "9090"]).status.success());
    assert!(proxybar(&path, &["config", "auto-start", "false"]).status.success());

    let settings = show(&path);
    assert_eq!(settings["port"], 9090);
    assert_eq!(settings["auto_start"], false);
}

#[test]
fn test_config_rejects_port_zero() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");

    let output = proxybar(&path, &["config", "set-port", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid port 0"));
    assert!(!path.exists());
}

#[test]
fn test_unknown_subcommand_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = proxybar(&temp_dir.path().join("settings.json"), &["launch"]);
    assert!(!output.status.success());
}
