//! CLI integration tests for oracle-migrate.
//!
//! These tests verify command-line argument parsing, help output, exit codes
//! for configuration errors, and the predicate commands that need no database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the oracle-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("oracle-migrate").unwrap()
}

/// Write a valid config whose predicates live under `predicates_dir`.
fn config_file(predicates_dir: &Path) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
source:
  endpoint: ORCL_SRC
  user: scott
  password: tiger
  schema: hr
target:
  endpoint: ORCL_DST
  user: stage
  password: stage
  schema: stage
migration:
  predicates_dir: "{}"
"#,
        predicates_dir.display()
    )
    .unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tables"))
        .stdout(predicate::str::contains("survey"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("copy"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("suggest"))
        .stdout(predicate::str::contains("where"));
}

#[test]
fn test_copy_subcommand_help() {
    cmd()
        .args(["copy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("Copy rows"));
}

#[test]
fn test_delete_subcommand_help() {
    cmd()
        .args(["delete", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_where_subcommand_help() {
    cmd()
        .args(["where", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("clear"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oracle-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_log_flags_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_suggest_requires_table() {
    cmd()
        .arg("suggest")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<TABLE>"));
}

#[test]
fn test_where_set_requires_predicate() {
    cmd().args(["where", "set", "emp"]).assert().code(2);
}

// =============================================================================
// Exit Code Tests - Config Errors
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // Missing file is an IO error, not a config error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "tables"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  endpoint: ORCL").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(2);
}

#[test]
fn test_empty_schema_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path());
    let yaml = std::fs::read_to_string(file.path())
        .unwrap()
        .replace("schema: stage", "schema: \"\"");
    std::fs::write(file.path(), yaml).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("target.schema is required"));
}

#[test]
fn test_zero_workers_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path());

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "--workers", "0", "tables"])
        .assert()
        .code(2);
}

// =============================================================================
// Saved Predicate Tests
// =============================================================================

#[test]
fn test_where_set_show_clear() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path());
    let config = file.path().to_str().unwrap();

    cmd()
        .args(["--config", config, "where", "set", "emp", "id > 100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved predicate for HR.EMP"));
    assert!(dir.path().join("HR__EMP.sql").exists());

    cmd()
        .args(["--config", config, "where", "show", "emp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id > 100"));

    cmd()
        .args(["--config", config, "where", "clear", "emp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cleared predicate for HR.EMP"));

    cmd()
        .args(["--config", config, "where", "show", "emp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no saved predicate for HR.EMP"));
}

#[test]
fn test_where_show_json_with_qualified_table() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path());
    let config = file.path().to_str().unwrap();

    cmd()
        .args(["--config", config, "where", "set", "sales.orders", "status = 'OPEN'"])
        .assert()
        .success();

    cmd()
        .args(["--config", config, "--output-json", "where", "show", "SALES.ORDERS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"table\":\"SALES.ORDERS\""))
        .stdout(predicate::str::contains("status = 'OPEN'"));
}

#[test]
fn test_where_set_blank_predicate_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(dir.path());

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "where", "set", "emp", "  "])
        .assert()
        .code(2);
}
