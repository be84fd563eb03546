// Unit tests for status snapshot parsing and the mode it proves

use crate::mode::{ServiceMode, StatusSnapshot};

use serde_json::json;

/// **VALUE**: A running server proves server mode even if a client is configured.
///
/// **WHY THIS MATTERS**: The snapshot is the authority the mode indicator is
/// reconciled against at startup.
#[test]
fn given_running_server_when_active_mode_then_server() {
    let snapshot = StatusSnapshot::from_value(&json!({
        "platform": "unix",
        "server_info": { "running": true, "port": 5555 },
        "client_info": { "running": false, "connected": false }
    }))
    .expect("valid status");

    assert_eq!(snapshot.active_mode(), Some(ServiceMode::Server));
}

#[test]
fn given_running_client_when_active_mode_then_client() {
    let snapshot = StatusSnapshot::from_value(&json!({
        "server_info": { "running": false },
        "client_info": { "running": true, "connected": true }
    }))
    .expect("valid status");

    assert_eq!(snapshot.active_mode(), Some(ServiceMode::Client));
}

#[test]
fn given_only_one_service_configured_when_active_mode_then_that_service() {
    let server_only = StatusSnapshot::from_value(&json!({ "server_info": { "running": false } }))
        .expect("valid status");
    let client_only = StatusSnapshot::from_value(&json!({ "client_info": { "running": false } }))
        .expect("valid status");

    assert_eq!(server_only.active_mode(), Some(ServiceMode::Server));
    assert_eq!(client_only.active_mode(), Some(ServiceMode::Client));
}

/// **VALUE**: An inconclusive snapshot proves nothing.
///
/// **BUG THIS CATCHES**: Defaulting to one mode and overriding a valid
/// local state with a guess.
#[test]
fn given_nothing_running_when_active_mode_then_none() {
    let neither = StatusSnapshot::from_value(&json!({ "platform": "unix" })).expect("valid status");
    let both_idle = StatusSnapshot::from_value(&json!({
        "server_info": { "running": false },
        "client_info": { "running": false }
    }))
    .expect("valid status");

    assert_eq!(neither.active_mode(), None);
    assert_eq!(both_idle.active_mode(), None);
}

#[test]
fn given_daemon_spelling_of_otp_flag_when_parsed_then_read() {
    let snapshot = StatusSnapshot::from_value(&json!({
        "client_info": {
            "running": true,
            "otp_nededed": true,
            "service_choice_needed": true,
            "available_servers": [{ "host": "10.0.0.1" }]
        }
    }))
    .expect("valid status");

    let client = snapshot.client_info.expect("client section");
    assert!(client.otp_needed);
    assert!(client.service_choice_needed);
    assert_eq!(client.available_servers.len(), 1);
}

#[test]
fn given_wrong_shape_when_parsed_then_status_error() {
    assert!(StatusSnapshot::from_value(&json!({ "server_info": "up" })).is_err());
}

#[test]
fn given_mode_names_in_any_case_when_parsed_then_accepted() {
    assert_eq!("server".parse::<ServiceMode>().ok(), Some(ServiceMode::Server));
    assert_eq!("Client".parse::<ServiceMode>().ok(), Some(ServiceMode::Client));
    assert!("auto".parse::<ServiceMode>().is_err());
    assert_eq!(ServiceMode::Server.to_string(), "server");
    assert_eq!(ServiceMode::Client.other(), ServiceMode::Server);
}
