// Unit tests for error module
// Tests JSON rendering (used by --json) and core error conversion

use crate::error::ConsoleError;

use bridge_core::error::{ConfigError, ModeError};
use bridge_core::ServiceMode;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

/// **VALUE**: Errors serialise with a variant tag and their message.
///
/// **WHY THIS MATTERS**: `--json` consumers branch on the error type.
///
/// **BUG THIS CATCHES**: Removing `#[derive(Serialize)]` or the serde tag
/// layout.
#[test]
fn given_console_error_when_serialized_then_tagged_with_variant() {
    // GIVEN: A link error
    let err = ConsoleError::Link {
        message: String::from("Daemon unreachable"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&err).expect("serializable");

    // THEN: Tagged and carrying the message
    assert_eq!(json["type"], "Link");
    assert_eq!(json["data"]["message"], "Daemon unreachable");
}

#[test]
fn given_mode_timeout_when_converted_then_request_error_keeps_core_message() {
    let core = ModeError::timeout(ServiceMode::Server, Duration::from_secs(5));
    let core_message = core.to_string();

    let err: ConsoleError = core.into();

    assert!(matches!(err, ConsoleError::Request { ref message, .. } if *message == core_message));
}

#[test]
fn given_config_error_when_converted_then_config_variant() {
    let core = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: "Daemon port cannot be 0".to_string(),
    };

    let err: ConsoleError = core.into();

    assert!(matches!(err, ConsoleError::Config { ref message, .. } if message.contains("port")));
}
