//! Smoke tests to verify command wiring (no database needed)

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn helpdesk() -> Command {
    let mut cmd = Command::cargo_bin("helpdesk").unwrap();
    // Keep the developer's environment out of the tests
    cmd.env_remove("DATABASE_URL")
        .env_remove("HELPDESK_CONFIG")
        .env_remove("SMTP_HOST")
        .env_remove("HELPDESK_PASSWORD");
    cmd
}

#[test]
fn test_top_level_help_lists_commands() {
    helpdesk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("escalate"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_serve_help() {
    helpdesk()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-escalation"))
        .stdout(predicate::str::contains("--cors-permissive"))
        .stdout(predicate::str::contains("--skip-migrations"));
}

#[test]
fn test_escalate_help() {
    helpdesk()
        .args(["escalate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_user_create_help() {
    helpdesk()
        .args(["user", "create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--role"));
}

#[test]
fn test_user_create_rejects_unknown_role() {
    helpdesk()
        .args([
            "user", "create", "--username", "ada", "--email", "ada@example.com", "--role", "root",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("role"));
}

#[test]
fn test_user_create_rejects_short_password_before_connecting() {
    helpdesk()
        .args([
            "user", "create", "--username", "ada", "--email", "ada@example.com", "--password", "short",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("password"));
}

#[test]
fn test_user_set_password_rejects_short_password_before_connecting() {
    helpdesk()
        .args(["user", "set-password", "--username", "ada", "--password", "short"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("password"));
}

#[test]
fn test_completions_bash() {
    helpdesk()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("helpdesk"));
}

#[test]
fn test_config_init_show_and_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let path_arg = path.to_str().unwrap();

    helpdesk()
        .args(["--config", path_arg, "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created yet"));

    helpdesk()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    helpdesk()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    helpdesk()
        .args(["--config", path_arg, "config", "show"])
        .env("DATABASE_URL", "postgres://app:secret@db/helpdesk")
        .assert()
        .success()
        .stdout(predicate::str::contains("high_hours = 1"))
        .stdout(predicate::str::contains("secret").not());
}

#[test]
fn test_missing_explicit_config_fails() {
    helpdesk()
        .args(["--config", "/nonexistent/helpdesk.toml", "config", "show"])
        .assert()
        .failure();
}
