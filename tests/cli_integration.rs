//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use chatlink::cli::{parse_args_from, Args};
use chatlink::config::{Config, ConfigError};
use chatlink::DeliveryMode;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("chatlink")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-e",
        "http://127.0.0.1:3978/v3/directline",
        "-s",
        "my-secret",
        "--user",
        "alice",
        "--mode",
        "poll",
        "-l",
        "debug",
        "--no-reconnect",
    ]))
    .unwrap();

    assert_eq!(
        result.endpoint,
        Some("http://127.0.0.1:3978/v3/directline".to_string())
    );
    assert_eq!(result.secret, Some("my-secret".to_string()));
    assert_eq!(result.user_id, Some("alice".to_string()));
    assert_eq!(result.mode, Some(DeliveryMode::Pull));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert!(result.no_reconnect);
}

#[test]
fn test_cli_missing_value() {
    let result = parse_args_from(args(&["--secret"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_unknown_flag() {
    let result = parse_args_from(args(&["--port", "8080"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "connection": {
            "endpoint": "http://10.0.0.5/v3/directline",
            "secret": "file-secret",
            "user_id": "kiosk-7",
            "mode": "push",
            "auto_reconnect": false
        },
        "timing": {
            "poll_interval_ms": 2500,
            "refresh_margin_secs": 120
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.connection.endpoint, "http://10.0.0.5/v3/directline");
    assert_eq!(config.connection.user_id, "kiosk-7");
    assert!(!config.connection.auto_reconnect);
    assert_eq!(config.timing.poll_interval_ms, 2500);
    assert_eq!(config.timing.refresh_margin_secs, 120);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some("/nonexistent/chatlink.json".into()),
        ..Args::default()
    };
    assert!(matches!(Config::load(&args), Err(ConfigError::Io(_))));
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "connection": {
            "secret": "file-secret",
            "user_id": "from-file",
            "mode": "push"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        secret: Some("cli-secret".to_string()),
        user_id: Some("from-cli".to_string()),
        mode: Some(DeliveryMode::Pull),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win
    assert_eq!(config.secret().unwrap(), "cli-secret");
    assert_eq!(config.connection.user_id, "from-cli");
    assert_eq!(config.connection.mode, DeliveryMode::Pull);
}

#[test]
fn test_config_no_reconnect_overrides_file() {
    let json = r#"{"connection": {"auto_reconnect": true}}"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        no_reconnect: true,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert!(!config.connection.auto_reconnect);
}

#[test]
fn test_config_to_session_options() {
    let json = r#"{
        "connection": {"mode": "pull"},
        "timing": {"poll_interval_ms": 200, "refresh_margin_secs": 15}
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let options = config.to_session_options();

    assert_eq!(options.mode, DeliveryMode::Pull);
    assert!(options.auto_reconnect);
    assert_eq!(options.poll_interval, Duration::from_millis(200));
    assert_eq!(options.refresh_margin, Duration::from_secs(15));
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let mut original = Config::default();
    original.connection.mode = DeliveryMode::Pull;
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.connection.endpoint, loaded.connection.endpoint);
    assert_eq!(loaded.connection.mode, DeliveryMode::Pull);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"timing": {"poll_interval_ms": 9999}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.timing.poll_interval_ms, 9999);
    assert_eq!(config.timing.refresh_margin_secs, 60); // Default
    assert_eq!(config.connection.mode, DeliveryMode::Push); // Default
    assert!(config.connection.auto_reconnect); // Default
}
