// Unit tests for bridge.json load/save/validate

use crate::config::BridgeConfig;
use crate::error::ConfigError;
use crate::mode::ServiceMode;
use crate::{DAEMON_HOST, DAEMON_PORT};

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: A missing config file yields defaults, not an error.
///
/// **WHY THIS MATTERS**: First run has no file; the bridge must still start.
#[test]
fn given_empty_dir_when_load_then_defaults() {
    let dir = TempDir::new().expect("temp dir");

    let config = BridgeConfig::load(dir.path()).expect("defaults");

    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.link.address(), format!("{DAEMON_HOST}:{DAEMON_PORT}"));
    assert_eq!(config.commands.timeout(), Duration::from_secs(5));
    assert_eq!(config.preferred_mode, None);
}

#[test]
fn given_saved_config_when_loaded_then_identical() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = BridgeConfig::default();
    config.link.port = 60000;
    config.commands.timeout_secs = 12;
    config.preferred_mode = Some(ServiceMode::Server);

    config.save(dir.path()).expect("save");
    let loaded = BridgeConfig::load(dir.path()).expect("load");

    assert_eq!(loaded, config);
    assert!(!dir.path().join("bridge.json.tmp").exists());
}

/// **VALUE**: Partial files fill the gaps with defaults.
///
/// **BUG THIS CATCHES**: A missing `#[serde(default)]` that turns an older
/// config file into a parse error.
#[test]
fn given_partial_file_when_loaded_then_missing_fields_defaulted() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("bridge.json"),
        r#"{ "link": { "port": 41000 }, "preferred_mode": "client" }"#,
    )
    .expect("write");

    let config = BridgeConfig::load(dir.path()).expect("load");

    assert_eq!(config.link.port, 41000);
    assert_eq!(config.link.host, DAEMON_HOST);
    assert_eq!(config.preferred_mode, Some(ServiceMode::Client));
}

/// **VALUE**: A corrupt file is an error, never silently replaced.
#[test]
fn given_corrupt_file_when_loaded_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("bridge.json"), "{ not json").expect("write");

    let result = BridgeConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: The daemon may only be reached over loopback.
///
/// **WHY THIS MATTERS**: The daemon socket is unauthenticated; pointing the
/// bridge at another host would send commands across the network.
#[test]
fn given_remote_host_when_validated_then_rejected() {
    let mut config = BridgeConfig::default();

    for host in ["localhost", "127.0.0.1", "::1"] {
        config.link.host = host.to_string();
        assert!(config.validate().is_ok(), "{host} should be accepted");
    }

    for host in ["192.168.1.10", "example.com", ""] {
        config.link.host = host.to_string();
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "{host} should be rejected"
        );
    }
}

#[test]
fn given_zero_port_or_timeout_when_validated_then_rejected() {
    let mut zero_port = BridgeConfig::default();
    zero_port.link.port = 0;
    let mut zero_timeout = BridgeConfig::default();
    zero_timeout.commands.timeout_secs = 0;
    let mut zero_connect = BridgeConfig::default();
    zero_connect.link.connect_max_elapsed_secs = 0;
    let mut future_version = BridgeConfig::default();
    future_version.version = 99;

    for config in [zero_port, zero_timeout, zero_connect, future_version] {
        assert!(config.validate().is_err(), "{config:?}");
    }
}

#[test]
fn given_invalid_config_when_saved_then_nothing_written() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = BridgeConfig::default();
    config.link.port = 0;

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("bridge.json").exists());
}
