mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_remote-actions"))
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run queries and provisioning steps on remote servers"));
    assert!(stdout.contains("query"));
    assert!(stdout.contains("probe"));
    assert!(stdout.contains("provision"));
    assert!(stdout.contains("targets"));
    assert!(stdout.contains("validate"));
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("remote-actions"));
}

#[test]
fn test_cli_query_help() {
    let output = cli_command().args(["query", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run a SQL query and print the rows"));
    assert!(stdout.contains("--engine"));
    assert!(stdout.contains("--database"));
    assert!(stdout.contains("--json"));
}

#[test]
fn test_cli_query_rejects_unknown_engine() {
    let output = cli_command()
        .args(["query", "--target", "db-1", "--engine", "oracle", "--sql", "SELECT 1"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("oracle"));
}

#[test]
fn test_cli_validate_sequence() {
    let dir = create_test_dir();
    let path = write_file(dir.path(), "shop.yaml", &database_sequence("shop", "db-1"));

    let output = cli_command()
        .current_dir(dir.path())
        .args(["validate", path.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("is valid (3 steps)"));
}

#[test]
fn test_cli_validate_invalid_sequence() {
    let dir = create_test_dir();
    let path = write_file(dir.path(), "bad.yaml", &invalid_sequence("bad"));

    let output = cli_command()
        .current_dir(dir.path())
        .args(["validate", path.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("disallowed character"));
}

#[test]
fn test_cli_validate_missing_file() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .args(["validate", "nonexistent.yaml"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_targets_lists_inventory() {
    let dir = create_test_dir();
    let key = write_key(dir.path());
    let config = write_config(dir.path(), &config_with_target("db-1", &key));

    let output = cli_command()
        .args(["--config", config.to_str().unwrap(), "targets"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("db-1 (deploy@127.0.0.1:1"));
}

#[test]
fn test_cli_targets_without_config() {
    let dir = create_test_dir();
    let output = cli_command()
        .current_dir(dir.path())
        .arg("targets")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No targets configured"));
}

#[test]
fn test_cli_provision_unknown_target() {
    let dir = create_test_dir();
    let path = write_file(dir.path(), "shop.yaml", &database_sequence("shop", "ghost"));

    let output = cli_command()
        .current_dir(dir.path())
        .args(["provision", path.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no credentials for target 'ghost'"));
}

#[test]
fn test_cli_probe_unreachable_target_reports_failure() {
    let dir = create_test_dir();
    let key = write_key(dir.path());
    let config = write_config(dir.path(), &config_with_target("db-1", &key));

    let output = cli_command()
        .args(["--config", config.to_str().unwrap(), "probe", "--target", "db-1"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗ db-1"));
    assert!(stdout.contains("connection"));
}
