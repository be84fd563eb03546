use crate::helpers::{ScriptedTransport, harness, wait_until};

use bridge_core::error::ModeError;
use bridge_core::{
    ActiveService, CommandKind, Diagnostic, Envelope, EventKind, ModeCoordinator, ModeState,
    ServiceMode, StatusSnapshot, SubscriptionRegistry,
};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

fn coordinator() -> (
    Arc<ScriptedTransport>,
    SubscriptionRegistry,
    ModeCoordinator<ScriptedTransport>,
) {
    let (transport, registry, correlator) = harness();
    (transport, registry, ModeCoordinator::new(correlator))
}

/// Daemon that accepts every service choice.
fn accept_choices(command: &str, params: Option<&Value>) -> Vec<Envelope> {
    let choice = params
        .and_then(|params| params.get("service"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match command {
        "service_choice" => vec![Envelope::command_success(CommandKind::ServiceChoice, choice, None)],
        _ => Vec::new(),
    }
}

fn stable(mode: ServiceMode) -> ActiveService {
    mode.into()
}

/// **VALUE**: A confirmed switch commits the target and leaves no wait behind.
#[tokio::test]
async fn given_client_mode_when_server_requested_and_confirmed_then_server() {
    // GIVEN: Coordinator showing client mode, daemon accepting choices
    let (transport, registry, coordinator) = coordinator();
    transport.respond_with(accept_choices);
    assert!(coordinator.assume_mode(ServiceMode::Client));

    // WHEN: Server requested
    let result = coordinator.request_mode(ServiceMode::Server).await;

    // THEN: Server is active, client remembered as previous
    assert_eq!(result.expect("switch"), ServiceMode::Server);
    assert_eq!(
        coordinator.state(),
        ModeState {
            active_service: ActiveService::Server,
            previous_service: Some(ServiceMode::Client),
        }
    );
    assert_eq!(
        transport.sent(),
        vec![("service_choice".to_string(), Some(json!({ "service": "server" })))]
    );
    assert!(registry.is_empty());
    assert_eq!(coordinator.wait_key(), None);
}

/// **VALUE**: Requesting the current mode does nothing.
///
/// **BUG THIS CATCHES**: Re-sending the choice, which the daemon answers by
/// restarting the running service.
#[tokio::test]
async fn given_server_mode_when_server_requested_then_no_command_and_no_change() {
    let (transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Server);
    let before = coordinator.state();

    let result = coordinator.request_mode(ServiceMode::Server).await;

    assert_eq!(result.expect("no-op"), ServiceMode::Server);
    assert_eq!(coordinator.state(), before);
    assert!(transport.sent().is_empty());
    assert!(registry.is_empty());
}

/// **VALUE**: A rejected send reverts the mode and reports one failure.
///
/// **WHY THIS MATTERS**: The indicator must never stay stuck on pending
/// when the daemon could not even be reached.
///
/// **BUG THIS CATCHES**: Leaving the state pending, leaking the wait
/// subscription, or reporting a service error for a dispatch failure.
#[tokio::test]
async fn given_unreachable_daemon_when_client_requested_then_reverts_with_dispatch_failure() {
    // GIVEN: Server mode and a transport that rejects sends
    let (transport, registry, coordinator) = coordinator();
    let mut reports = registry.diagnostics().subscribe();
    coordinator.assume_mode(ServiceMode::Server);
    let before = coordinator.state();
    transport.reject_sends(true);

    // WHEN: Client requested
    let error = coordinator
        .request_mode(ServiceMode::Client)
        .await
        .expect_err("dispatch failure");

    // THEN: Reverted, surfaced as dispatch failure, nothing dangling
    assert!(error.is_dispatch_failure());
    assert_eq!(coordinator.state().active_service, before.active_service);
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
    assert!(matches!(
        reports.try_recv(),
        Ok(Diagnostic::ModeSwitchFailed { target: ServiceMode::Client, .. })
    ));
    assert!(reports.try_recv().is_err(), "exactly one failure notification");
}

#[tokio::test]
async fn given_daemon_refuses_when_server_requested_then_reverts_with_service_error() {
    let (transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Client);
    transport.respond_with(|_, _| {
        vec![Envelope::command_error(
            CommandKind::ServiceChoice,
            "Cannot start server while client is running",
        )]
    });

    let error = coordinator
        .request_mode(ServiceMode::Server)
        .await
        .expect_err("refused");

    assert!(matches!(
        error,
        ModeError::Switch { target: ServiceMode::Server, ref source, .. } if source.is_service_reported()
    ));
    assert_eq!(coordinator.state().active_service, stable(ServiceMode::Client));
    assert!(registry.is_empty());
}

/// **VALUE**: The last of two rapid requests decides the outcome.
///
/// **WHY THIS MATTERS**: Users click back and forth. The older wait must
/// neither commit nor leave its subscription behind, and the late answer
/// to the older command must not resolve the newer wait.
///
/// **BUG THIS CATCHES**: Queueing requests, committing the first answer,
/// or two live wait keys for one logical switch.
#[tokio::test]
async fn given_pending_switch_when_newer_request_arrives_then_last_request_wins() {
    // GIVEN: A server request in flight
    let (transport, registry, coordinator) = coordinator();
    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_mode(ServiceMode::Server).await }
    });
    wait_until(|| coordinator.wait_key().is_some()).await;
    let first_key = coordinator.wait_key().expect("first wait");

    // WHEN: A client request supersedes it
    let second = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_mode(ServiceMode::Client).await }
    });
    wait_until(|| coordinator.wait_key().is_some_and(|key| key != first_key)).await;

    // THEN: Exactly one wait key is live, and it is the new one
    assert_eq!(registry.len(), 1);
    assert!(!registry.contains(&first_key));
    assert_eq!(
        coordinator.state().active_service,
        ActiveService::Pending(Some(ServiceMode::Client))
    );

    // WHEN: The older command's answer arrives, then the newer one's
    transport.publish(&Envelope::command_success(CommandKind::ServiceChoice, "server", None));
    transport.publish(&Envelope::command_success(CommandKind::ServiceChoice, "client", None));

    // THEN: First superseded, second committed
    let first = first.await.expect("join");
    let second = second.await.expect("join");
    assert!(matches!(first, Err(ModeError::Superseded { target: ServiceMode::Server, .. })));
    assert_eq!(second.expect("second switch"), ServiceMode::Client);
    assert_eq!(coordinator.state().active_service, ActiveService::Client);
    assert_eq!(transport.sent_commands(), ["service_choice", "service_choice"]);
    assert!(registry.is_empty());
}

/// **VALUE**: A switch that is never answered times out cleanly.
///
/// **BUG THIS CATCHES**: The wait key surviving the timeout, or the mode
/// staying pending.
#[tokio::test]
async fn given_unanswered_switch_when_timeout_elapses_then_registry_empty_and_reverted() {
    let (transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Client);

    let error = coordinator
        .request_mode_within(ServiceMode::Server, Duration::from_millis(20))
        .await
        .expect_err("timeout");

    assert!(matches!(error, ModeError::Timeout { target: ServiceMode::Server, .. }));
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
    assert_eq!(coordinator.state().active_service, ActiveService::Client);
}

/// **VALUE**: The status snapshot overrides an unconfirmed local mode.
///
/// **WHY THIS MATTERS**: On start the UI shows a configured default. If the
/// daemon already runs the server, the UI must show server.
#[tokio::test]
async fn given_assumed_client_when_snapshot_reports_running_server_then_server() {
    let (transport, _registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Client);
    transport.respond_with(|command, _| match command {
        "status" => vec![Envelope::command_success(
            CommandKind::Status,
            "Status retrieved",
            Some(json!({
                "platform": "unix",
                "server_info": { "running": true },
                "client_info": { "running": false }
            })),
        )],
        _ => Vec::new(),
    });

    let snapshot = coordinator.refresh_status().await.expect("status");

    assert_eq!(snapshot.active_mode(), Some(ServiceMode::Server));
    assert_eq!(coordinator.state().active_service, ActiveService::Server);
}

/// **VALUE**: A snapshot arriving mid-switch wins and ends the wait.
///
/// **BUG THIS CATCHES**: The in-flight wait later overwriting observed
/// truth, or its subscription outliving the supersession.
#[tokio::test]
async fn given_pending_switch_when_snapshot_applied_then_snapshot_wins_and_wait_released() {
    let (_transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Server);
    let switch = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_mode(ServiceMode::Client).await }
    });
    wait_until(|| coordinator.wait_key().is_some()).await;

    let snapshot = StatusSnapshot::from_value(&json!({ "server_info": { "running": true } }))
        .expect("snapshot");
    assert_eq!(coordinator.apply_snapshot(&snapshot), Some(ServiceMode::Server));

    let outcome = switch.await.expect("join");
    assert!(matches!(outcome, Err(ModeError::Superseded { .. })));
    assert_eq!(coordinator.state().active_service, ActiveService::Server);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn given_inconclusive_snapshot_when_applied_then_state_unchanged() {
    let (_transport, _registry, coordinator) = coordinator();

    let applied = coordinator.apply_snapshot(&StatusSnapshot::default());

    assert_eq!(applied, None);
    assert_eq!(coordinator.state(), ModeState::default());
}

#[tokio::test]
async fn given_assumed_mode_when_assumed_again_then_ignored() {
    let (_transport, _registry, coordinator) = coordinator();

    assert!(coordinator.assume_mode(ServiceMode::Client));
    assert!(!coordinator.assume_mode(ServiceMode::Server));
    assert_eq!(coordinator.state().active_service, ActiveService::Client);
}

/// **VALUE**: `service_started` notifications are observed truth.
#[tokio::test]
async fn given_attached_coordinator_when_service_started_then_mode_follows() {
    let (transport, registry, coordinator) = coordinator();
    let mut changes = coordinator.subscribe();

    assert!(coordinator.attach());
    assert!(!coordinator.attach());
    assert_eq!(registry.len(), 1);
    assert_eq!(transport.bus().subscriber_count("service_started"), 1);

    transport.publish(
        &Envelope::new(EventKind::ServiceStarted).with_payload(json!({ "service_name": "server" })),
    );

    assert_eq!(coordinator.state().active_service, ActiveService::Server);
    assert!(changes.has_changed().expect("sender alive"));
    assert_eq!(changes.borrow_and_update().active_service, ActiveService::Server);

    assert!(coordinator.detach());
    assert_eq!(transport.bus().subscriber_count("service_started"), 0);
}

#[tokio::test]
async fn given_pending_switch_when_cancelled_then_reverted_and_wait_released() {
    let (_transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Client);
    let switch = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_mode(ServiceMode::Server).await }
    });
    wait_until(|| coordinator.wait_key().is_some()).await;

    assert!(coordinator.cancel());
    assert!(!coordinator.cancel());

    assert!(switch.await.expect("join").is_err());
    assert_eq!(coordinator.state().active_service, ActiveService::Client);
    assert!(registry.is_empty());
}

/// **VALUE**: A switch whose caller stops waiting reverts the visible mode.
///
/// **WHY THIS MATTERS**: The mode indicator must never stay pending. A
/// caller may wrap `request_mode` in its own timeout or `select!` and drop
/// it at any point, including while the command is still being sent.
///
/// **BUG THIS CATCHES**: Reverting only from the failure path, so an
/// abandoned switch stays `Pending` with its wait key still registered.
#[tokio::test]
async fn given_stalled_send_when_switch_abandoned_then_reverted_and_registry_empty() {
    // GIVEN: Client mode observed, daemon no longer reading
    let (transport, registry, coordinator) = coordinator();
    let snapshot = StatusSnapshot::from_value(&json!({ "client_info": { "running": true } }))
        .expect("snapshot");
    coordinator.apply_snapshot(&snapshot);
    transport.stall_sends(true);

    // WHEN: The caller gives up on the switch
    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        coordinator.request_mode(ServiceMode::Server),
    )
    .await;

    // THEN: Back in client mode with nothing registered
    assert!(outcome.is_err());
    assert_eq!(coordinator.state().active_service, ActiveService::Client);
    assert_eq!(coordinator.wait_key(), None);
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
}

/// **VALUE**: Abandoning a switch after it was sent also reverts it.
///
/// **BUG THIS CATCHES**: A guard that only covers the send, leaving the
/// mode pending when the caller drops the wait for the daemon's answer.
#[tokio::test]
async fn given_sent_switch_when_caller_times_out_externally_then_reverted_and_wait_released() {
    let (transport, registry, coordinator) = coordinator();
    coordinator.assume_mode(ServiceMode::Server);

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        coordinator.request_mode(ServiceMode::Client),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(transport.sent_commands(), vec!["service_choice".to_string()]);
    assert_eq!(coordinator.state().active_service, ActiveService::Server);
    assert_eq!(coordinator.wait_key(), None);
    assert!(registry.is_empty());
}
