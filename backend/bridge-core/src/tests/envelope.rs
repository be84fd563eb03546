// Unit tests for envelope decoding and validation

use crate::error::ProtocolError;
use crate::event::{CommandKind, Envelope, EventKind};
use serde_json::json;

/// **VALUE**: A daemon success notification decodes with its command lifted out.
///
/// **WHY THIS MATTERS**: Correlation filters on `envelope.command`; the
/// remaining `data` is what callers read the result from.
///
/// **BUG THIS CATCHES**: `command` left inside the payload, or the result
/// not reachable through `result()`.
#[test]
fn given_success_line_when_parsed_then_command_and_result_are_split() {
    // GIVEN: A status result as the daemon writes it
    let line = json!({
        "event_type": "command_success",
        "data": { "command": "status", "result": { "platform": "unix" } },
        "timestamp": "2026-01-01T00:00:00",
        "source": "daemon",
        "message": "Status retrieved"
    })
    .to_string();

    // WHEN: Parsed
    let envelope = Envelope::parse(&line).expect("valid notification");

    // THEN: Command is lifted, payload keeps the rest
    assert_eq!(envelope.kind, EventKind::CommandSuccess);
    assert_eq!(envelope.command, Some(CommandKind::Status));
    assert_eq!(envelope.result(), Some(&json!({ "platform": "unix" })));
    assert_eq!(envelope.message.as_deref(), Some("Status retrieved"));
    assert!(envelope.payload.as_ref().and_then(|p| p.get("command")).is_none());
}

#[test]
fn given_error_line_when_parsed_then_error_message_prefers_error_field() {
    let line = json!({
        "event_type": "command_error",
        "data": { "command": "service_choice", "error": "Cannot start server while client is running" },
        "message": "Command service_choice failed: Cannot start server while client is running"
    })
    .to_string();

    let envelope = Envelope::parse(&line).expect("valid notification");

    assert_eq!(envelope.command, Some(CommandKind::ServiceChoice));
    assert_eq!(
        envelope.error_message(),
        Some("Cannot start server while client is running")
    );
}

/// **VALUE**: A command-result envelope without a command is rejected.
///
/// **WHY THIS MATTERS**: A result nobody can correlate would never resolve a
/// wait; it has to surface as a protocol inconsistency instead.
///
/// **BUG THIS CATCHES**: Validation that only checks the event type.
#[test]
fn given_result_without_command_when_parsed_then_malformed_result() {
    let line = json!({ "event_type": "command_success", "message": "ok" }).to_string();

    let result = Envelope::parse(&line);

    assert!(matches!(result, Err(ProtocolError::MalformedResult { .. })));
}

#[test]
fn given_result_with_unknown_command_when_parsed_then_malformed_result() {
    let line = json!({
        "event_type": "command_success",
        "data": { "command": "launch_rockets" },
        "message": "ok"
    })
    .to_string();

    let result = Envelope::parse(&line);

    assert!(matches!(result, Err(ProtocolError::MalformedResult { .. })));
}

#[test]
fn given_result_with_neither_payload_nor_message_when_parsed_then_malformed_result() {
    let line = json!({
        "event_type": "command_error",
        "data": { "command": "ping" }
    })
    .to_string();

    let result = Envelope::parse(&line);

    assert!(matches!(result, Err(ProtocolError::MalformedResult { .. })));
}

/// **VALUE**: Unknown event types are reported, not guessed at.
///
/// **BUG THIS CATCHES**: Falling back to a generic kind, which would let
/// unknown traffic reach subscribers of that kind.
#[test]
fn given_unknown_event_type_when_parsed_then_unknown_event() {
    let line = json!({ "event_type": "solar_flare", "data": {} }).to_string();

    let result = Envelope::parse(&line);

    assert!(matches!(
        result,
        Err(ProtocolError::UnknownEvent { ref name, .. }) if name == "solar_flare"
    ));
}

#[test]
fn given_invalid_json_when_parsed_then_json_error() {
    assert!(matches!(
        Envelope::parse("{not json"),
        Err(ProtocolError::Json { .. })
    ));
}

/// **VALUE**: Generic notifications may omit the command.
#[test]
fn given_generic_event_without_command_when_parsed_then_accepted() {
    let line = json!({
        "event_type": "service_started",
        "data": { "service_name": "server" }
    })
    .to_string();

    let envelope = Envelope::parse(&line).expect("generic event");

    assert_eq!(envelope.kind, EventKind::ServiceStarted);
    assert_eq!(envelope.command, None);
    assert_eq!(envelope.source, "daemon");
    assert_eq!(envelope.payload, Some(json!({ "service_name": "server" })));
}

/// **VALUE**: Envelopes built locally serialise to what the parser accepts.
///
/// **WHY THIS MATTERS**: Test daemons and the scripted transport build
/// envelopes with these helpers; they must look like real daemon output.
#[test]
fn given_command_helpers_when_written_to_wire_then_parse_back_identically() {
    let success = Envelope::command_success(
        CommandKind::ServiceChoice,
        "server",
        Some(json!("server")),
    );
    let error = Envelope::command_error(CommandKind::StartClient, "no server chosen");

    for envelope in [success, error] {
        let line = serde_json::to_string(&envelope.to_wire()).expect("serialise");
        assert_eq!(Envelope::parse(&line).expect("parse back"), envelope);
    }
}

#[test]
fn given_command_error_helper_then_message_follows_daemon_format() {
    let envelope = Envelope::command_error(CommandKind::StartClient, "no server chosen");

    assert_eq!(
        envelope.message.as_deref(),
        Some("Command start_client failed: no server chosen")
    );
    assert_eq!(envelope.error_message(), Some("no server chosen"));
}
