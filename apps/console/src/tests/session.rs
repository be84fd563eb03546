use crate::session::{StatusReport, describe_mode};

use bridge_core::{ActiveService, ModeState, ServiceMode, StatusSnapshot};

use serde_json::json;

fn snapshot(value: serde_json::Value) -> StatusSnapshot {
    StatusSnapshot::from_value(&value).expect("valid status")
}

/// **VALUE**: The report reflects both the snapshot and the mode machine.
///
/// **BUG THIS CATCHES**: Reading the mode from the snapshot alone, which
/// would show a mode the machine has not adopted.
#[test]
fn given_client_snapshot_when_reported_then_fields_and_text_match() {
    let snapshot = snapshot(json!({
        "client_info": {
            "running": true,
            "connected": false,
            "service_choice_needed": true,
            "available_servers": [{}, {}]
        }
    }));
    let state = ModeState {
        active_service: ActiveService::Client,
        previous_service: None,
    };

    let report = StatusReport::new(&snapshot, state);

    assert_eq!(report.mode, Some(ServiceMode::Client));
    assert!(!report.pending);
    assert!(report.client_running);
    assert_eq!(report.available_servers, 2);
    assert_eq!(
        report.to_string(),
        "mode:    client\nserver:  stopped\nclient:  running\nserver choice needed (2 found)"
    );
}

#[test]
fn given_report_when_serialized_then_mode_is_lowercase() {
    let report = StatusReport::new(
        &snapshot(json!({ "server_info": { "running": true } })),
        ModeState {
            active_service: ActiveService::Server,
            previous_service: Some(ServiceMode::Client),
        },
    );

    let value = serde_json::to_value(&report).expect("serializable");

    assert_eq!(value["mode"], "server");
    assert_eq!(value["server_running"], true);
}

#[test]
fn given_mode_states_when_described_then_readable() {
    let pending = ModeState {
        active_service: ActiveService::Pending(Some(ServiceMode::Server)),
        previous_service: Some(ServiceMode::Client),
    };

    assert_eq!(describe_mode(&pending), "switching to server");
    assert_eq!(describe_mode(&ModeState::default()), "unknown");
}
