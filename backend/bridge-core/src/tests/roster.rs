// Unit tests for client identity reconciliation
// Tests matcher precedence, key stability and incremental identity

use crate::error::RosterError;
use crate::roster::matcher::{self, MATCHERS};
use crate::roster::{ClientRecord, Observation, Roster};

use std::time::{Duration, SystemTime};

use serde_json::json;

fn record(key: &str, uid: Option<&str>, hostname: &str, address: &str) -> ClientRecord {
    ClientRecord {
        identity_key: key.to_string(),
        uid: uid.map(str::to_string),
        hostname: hostname.to_string(),
        address: address.to_string(),
        online: false,
        last_seen_at: None,
        screen_position: None,
    }
}

/// **VALUE**: The same observation twice yields one record, not two.
///
/// **WHY THIS MATTERS**: The daemon repeats `client_connected` on reconnect.
///
/// **BUG THIS CATCHES**: Always appending instead of matching.
#[test]
fn given_same_observation_twice_when_reconciled_then_single_record() {
    let mut roster = Roster::new();
    let observation = Observation::new()
        .with_uid("uid-1")
        .with_hostname("desk")
        .with_address("192.168.1.20");

    roster.reconcile(&observation, true).expect("identifiable");
    let records = roster.reconcile(&observation, true).expect("identifiable");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity_key, "uid-1");
    assert!(records[0].online);
}

/// **VALUE**: An address-only record absorbs the uid learned later.
///
/// **WHY THIS MATTERS**: The daemon sees a client's address before it issues
/// the client a uid. Both sightings are the same machine.
///
/// **BUG THIS CATCHES**: Creating a second record for the uid sighting, or
/// rewriting the record's key to the uid.
#[test]
fn given_address_only_record_when_uid_observed_at_same_address_then_merged_and_key_stable() {
    // GIVEN: A client first seen only by address
    let mut roster = Roster::new();
    roster
        .reconcile(&Observation::new().with_address("10.0.0.7"), true)
        .expect("identifiable");

    // WHEN: Seen again with a uid and hostname
    let records = roster
        .reconcile(
            &Observation::new()
                .with_uid("uid-7")
                .with_address("10.0.0.7")
                .with_hostname("laptop"),
            false,
        )
        .expect("identifiable");

    // THEN: One record, original key, uid learned, fields updated
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity_key, "address:10.0.0.7");
    assert_eq!(records[0].uid.as_deref(), Some("uid-7"));
    assert_eq!(records[0].hostname, "laptop");
    assert!(!records[0].online);

    // AND: Later uid-only sightings still land on it
    let records = roster
        .reconcile(&Observation::new().with_uid("uid-7"), true)
        .expect("identifiable");
    assert_eq!(records.len(), 1);
    assert!(records[0].online);
}

/// **VALUE**: Uid beats address beats hostname.
///
/// **BUG THIS CATCHES**: Matching the first record that satisfies any
/// matcher, instead of trying matchers in priority order.
#[test]
fn given_records_matching_by_different_fields_when_found_then_uid_match_wins() {
    let records = vec![
        record("hostname:desk", None, "desk", ""),
        record("address:10.0.0.1", None, "", "10.0.0.1"),
        record("uid-9", Some("uid-9"), "other", "10.0.0.9"),
    ];
    let observation = Observation::new()
        .with_uid("uid-9")
        .with_address("10.0.0.1")
        .with_hostname("desk");

    assert_eq!(matcher::find(&records, &observation), Some(2));

    let without_uid = Observation::new().with_address("10.0.0.1").with_hostname("desk");
    assert_eq!(matcher::find(&records, &without_uid), Some(1));

    let hostname_only = Observation::new().with_hostname("desk");
    assert_eq!(matcher::find(&records, &hostname_only), Some(0));
}

#[test]
fn given_matchers_then_order_is_uid_address_hostname() {
    let names: Vec<&str> = MATCHERS.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["uid", "address", "hostname"]);
}

#[test]
fn given_record_bound_to_other_uid_when_address_matches_then_not_merged() {
    let mut roster = Roster::new();
    roster
        .reconcile(&Observation::new().with_uid("a").with_address("10.0.0.2"), true)
        .expect("identifiable");

    let records = roster
        .reconcile(&Observation::new().with_uid("b").with_address("10.0.0.2"), true)
        .expect("identifiable");

    assert_eq!(records.len(), 2);
}

#[test]
fn given_partial_observations_then_keys_follow_precedence() {
    assert_eq!(
        matcher::synthesize_key(&Observation::new().with_uid("u").with_address("1.2.3.4")),
        Some("u".to_string())
    );
    assert_eq!(
        matcher::synthesize_key(&Observation::new().with_address("1.2.3.4").with_hostname("h")),
        Some("address:1.2.3.4".to_string())
    );
    assert_eq!(
        matcher::synthesize_key(&Observation::new().with_hostname("h")),
        Some("hostname:h".to_string())
    );
    assert_eq!(matcher::synthesize_key(&Observation::new()), None);
}

/// **VALUE**: Blank observations are rejected and leave the roster untouched.
#[test]
fn given_blank_observation_when_reconciled_then_unidentifiable() {
    let mut roster = Roster::new();
    let blank = Observation::new().with_hostname("   ").with_address("");

    let result = roster.reconcile(&blank, true);

    assert!(matches!(result, Err(RosterError::Unidentifiable { .. })));
    assert!(roster.is_empty());
}

#[test]
fn given_missing_fields_in_later_observation_when_reconciled_then_known_values_kept() {
    let mut roster = Roster::new();
    let first_seen = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    let later = first_seen + Duration::from_secs(60);
    roster
        .reconcile_at(
            &Observation::new()
                .with_uid("u1")
                .with_hostname("desk")
                .with_address("10.0.0.3")
                .with_screen_position("left"),
            true,
            first_seen,
        )
        .expect("identifiable");

    let records = roster
        .reconcile_at(&Observation::new().with_uid("u1"), false, later)
        .expect("identifiable");

    assert_eq!(records[0].hostname, "desk");
    assert_eq!(records[0].address, "10.0.0.3");
    assert_eq!(records[0].screen_position.as_deref(), Some("left"));
    assert_eq!(records[0].last_seen_at, Some(later));
    assert!(!records[0].online);
}

#[test]
fn given_daemon_client_payload_when_read_then_observation_uses_daemon_field_names() {
    let payload = json!({
        "uid": "abc",
        "host_name": "studio",
        "ip_address": "192.168.0.4",
        "screen_position": "top",
        "ssl": true
    });

    let observation = Observation::from_payload(&payload);

    assert_eq!(
        observation,
        Observation::new()
            .with_uid("abc")
            .with_hostname("studio")
            .with_address("192.168.0.4")
            .with_screen_position("top")
    );
}

#[test]
fn given_roster_when_removed_or_reset_then_records_dropped() {
    let mut roster = Roster::new();
    roster.reconcile(&Observation::new().with_uid("one"), true).expect("identifiable");
    roster.reconcile(&Observation::new().with_uid("two"), true).expect("identifiable");

    let removed = roster.remove("one").expect("known client");
    assert_eq!(removed.identity_key, "one");
    assert!(matches!(
        roster.remove("one"),
        Err(RosterError::UnknownClient { .. })
    ));
    assert_eq!(roster.len(), 1);

    roster.reset();
    assert!(roster.is_empty());
}
