// Unit tests for the wire-name codec
// Tests round-trips over every kind and rejection of foreign names

use crate::event::{CommandKind, EventKind, WireName};
use strum::IntoEnumIterator;

/// **VALUE**: Every notification kind survives encode → decode.
///
/// **WHY THIS MATTERS**: Subscriptions are keyed by wire name. A kind whose
/// name does not decode back to itself can be subscribed to but never
/// delivered.
///
/// **BUG THIS CATCHES**: A variant added with a custom serialisation that the
/// decoder does not accept.
#[test]
fn given_every_event_kind_when_encoded_then_decodes_to_same_kind() {
    for kind in EventKind::iter() {
        assert_eq!(EventKind::decode(kind.encode()), Some(kind), "{kind:?}");
    }
}

#[test]
fn given_every_command_kind_when_encoded_then_decodes_to_same_kind() {
    for kind in CommandKind::iter() {
        assert_eq!(CommandKind::decode(kind.encode()), Some(kind), "{kind:?}");
    }
}

/// **VALUE**: Wire names are lowercase with `_` between words.
///
/// **WHY THIS MATTERS**: The daemon matches these strings byte-for-byte.
///
/// **BUG THIS CATCHES**: A casing change in the derive configuration.
#[test]
fn given_multi_word_kinds_when_encoded_then_uses_snake_case() {
    assert_eq!(EventKind::ServiceInitialized.encode(), "service_initialized");
    assert_eq!(EventKind::CommandSuccess.encode(), "command_success");
    assert_eq!(EventKind::ClientDisconnected.encode(), "client_disconnected");
    assert_eq!(CommandKind::ServiceChoice.encode(), "service_choice");
    assert_eq!(CommandKind::Ping.encode(), "ping");
}

/// **VALUE**: Unknown wire names decode to `None` instead of failing.
///
/// **WHY THIS MATTERS**: A newer daemon may emit kinds this build does not
/// know. They must be ignored, not crash the reader.
///
/// **BUG THIS CATCHES**: A decoder that accepts near-misses (other casing,
/// stray whitespace) or panics on unknown input.
#[test]
fn given_foreign_names_when_decoded_then_returns_none() {
    assert_eq!(EventKind::decode("ServiceInitialized"), None);
    assert_eq!(EventKind::decode("SERVICE_INITIALIZED"), None);
    assert_eq!(EventKind::decode(" service_initialized"), None);
    assert_eq!(EventKind::decode("not_an_event"), None);
    assert_eq!(EventKind::decode(""), None);
    assert_eq!(CommandKind::decode("servicechoice"), None);
}

#[test]
fn given_result_kinds_when_checked_then_only_command_results_qualify() {
    assert!(EventKind::CommandSuccess.is_command_result());
    assert!(EventKind::CommandError.is_command_result());
    assert!(!EventKind::ServiceStarted.is_command_result());
    assert!(!EventKind::Error.is_command_result());
}
