use crate::helpers::harness;

use bridge_core::{Diagnostic, Envelope, EventKind, RosterFeed};

use std::sync::Arc;

use serde_json::json;

fn connected(payload: serde_json::Value) -> Envelope {
    Envelope::new(EventKind::ClientConnected).with_payload(payload)
}

fn disconnected(payload: serde_json::Value) -> Envelope {
    Envelope::new(EventKind::ClientDisconnected).with_payload(payload)
}

/// **VALUE**: Views share one transport subscription per roster event.
///
/// **WHY THIS MATTERS**: Each mounted view attaches to the feed. Without
/// sharing, every notification would be reconciled once per view.
///
/// **BUG THIS CATCHES**: Tearing the subscription down while a view still
/// needs it, or keeping it after the last view detaches.
#[tokio::test]
async fn given_two_views_when_attached_and_detached_then_one_subscription_until_last_leaves() {
    // GIVEN: Two views attached
    let (transport, registry, _correlator) = harness();
    let feed = RosterFeed::new(Arc::clone(&transport), registry.clone());
    assert_eq!(feed.attach(), 1);
    assert_eq!(feed.attach(), 2);

    // THEN: One subscription per event kind
    assert_eq!(transport.bus().subscriber_count("client_connected"), 1);
    assert_eq!(transport.bus().subscriber_count("client_disconnected"), 1);
    assert_eq!(registry.ref_count("roster:client_connected"), Some(2));

    // WHEN: First view detaches
    assert!(!feed.detach());

    // THEN: Still fed
    assert!(feed.is_attached());
    assert_eq!(transport.bus().subscriber_count("client_connected"), 1);

    // WHEN: Last view detaches
    assert!(feed.detach());

    // THEN: Gone
    assert!(!feed.is_attached());
    assert_eq!(transport.bus().total_subscribers(), 0);
}

/// **VALUE**: Notifications converge on one record per client.
///
/// **BUG THIS CATCHES**: A uid sighting after an address-only sighting
/// producing a second roster entry.
#[tokio::test]
async fn given_attached_feed_when_client_seen_by_address_then_uid_then_one_record() {
    let (transport, registry, _correlator) = harness();
    let feed = RosterFeed::new(Arc::clone(&transport), registry);
    feed.attach();

    transport.publish(&connected(json!({ "ip_address": "192.168.1.30", "hostname": "den" })));
    transport.publish(&connected(json!({
        "uid": "c-30",
        "ip_address": "192.168.1.30",
        "host_name": "den-pc"
    })));
    transport.publish(&disconnected(json!({ "uid": "c-30" })));

    let records = feed.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity_key, "address:192.168.1.30");
    assert_eq!(records[0].uid.as_deref(), Some("c-30"));
    assert_eq!(records[0].hostname, "den-pc");
    assert!(!records[0].online);
}

#[tokio::test]
async fn given_unidentifiable_payload_when_published_then_reported_and_roster_unchanged() {
    let (transport, registry, _correlator) = harness();
    let mut reports = registry.diagnostics().subscribe();
    let feed = RosterFeed::new(Arc::clone(&transport), registry);
    feed.attach();

    transport.publish(&connected(json!({ "screen_position": "left" })));
    transport.publish(&Envelope::new(EventKind::ClientConnected));

    assert!(feed.records().is_empty());
    assert_eq!(reports.try_recv().ok(), Some(Diagnostic::UnidentifiableClient));
    assert_eq!(reports.try_recv().ok(), Some(Diagnostic::UnidentifiableClient));
}

#[tokio::test]
async fn given_known_client_when_removed_by_operator_then_next_sighting_creates_fresh_record() {
    let (transport, registry, _correlator) = harness();
    let feed = RosterFeed::new(Arc::clone(&transport), registry);
    feed.attach();
    transport.publish(&connected(json!({ "uid": "c-1" })));

    let removed = feed.remove("c-1").expect("known");
    assert_eq!(removed.uid.as_deref(), Some("c-1"));
    assert!(feed.get("c-1").is_none());
    assert!(feed.remove("c-1").is_err());

    transport.publish(&connected(json!({ "uid": "c-1" })));
    assert!(feed.get("c-1").is_some_and(|record| record.online));

    feed.reset();
    assert!(feed.records().is_empty());
}
