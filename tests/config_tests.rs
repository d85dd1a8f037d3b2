//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides
//! through the binary's `config` subcommands.

use std::fs;
use std::path::PathBuf;

use predicates::prelude::*;
use tempfile::TempDir;

/// Test fixture for configuration testing
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

fn validate(fixture: &ConfigFixture) -> assert_cmd::assert::Assert {
    assert_cmd::Command::cargo_bin("taskbridge-worker")
        .unwrap()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_minimal_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[worker]

[manager]

[server]

[logging]
"#,
    );

    validate(&fixture).success();
}

#[test]
fn test_full_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[worker]
task_id = 17
packages = ["/tmp"]

[manager]
host = "manager.example.com"
port = 9100
heartbeat_interval_secs = 5
connect_timeout_secs = 60

[server]
host = "0.0.0.0"
port = 9200

[logging]
level = "debug"
file = "/tmp/taskbridge/worker.log"
json_format = false
"#,
    );

    validate(&fixture).success();
}

#[test]
fn test_empty_config_uses_defaults() {
    let fixture = ConfigFixture::new();
    fixture.write_config("");

    validate(&fixture).success();
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_toml_syntax() {
    let fixture = ConfigFixture::new();
    fixture.write_config("this is not [ valid toml");

    validate(&fixture)
        .code(10)
        .stderr(predicate::str::contains("parse"));
}

#[test]
fn test_empty_manager_host() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[manager]
host = ""
"#,
    );

    validate(&fixture)
        .code(10)
        .stderr(predicate::str::contains("host"));
}

#[test]
fn test_zero_heartbeat_interval() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[manager]
heartbeat_interval_secs = 0
"#,
    );

    validate(&fixture)
        .code(10)
        .stderr(predicate::str::contains("heartbeat"));
}

#[test]
fn test_invalid_log_level() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[logging]
level = "loud"
"#,
    );

    validate(&fixture)
        .code(10)
        .stderr(predicate::str::contains("log level"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file_value() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[manager]
heartbeat_interval_secs = 5
"#,
    );

    // an env override that makes the config invalid proves the
    // environment wins over the file
    validate_with_env(&fixture, "TASKBRIDGE_HEARTBEAT_INTERVAL_SECS", "0")
        .code(10)
        .stderr(predicate::str::contains("heartbeat"));
}

#[test]
fn test_env_log_level_override() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[logging]
level = "info"
"#,
    );

    validate_with_env(&fixture, "TASKBRIDGE_LOG_LEVEL", "loud")
        .code(10)
        .stderr(predicate::str::contains("log level"));
}

fn validate_with_env(
    fixture: &ConfigFixture,
    key: &str,
    value: &str,
) -> assert_cmd::assert::Assert {
    assert_cmd::Command::cargo_bin("taskbridge-worker")
        .unwrap()
        .env(key, value)
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(fixture.path())
        .assert()
}
