use crate::helpers::{ScriptedTransport, harness};

use bridge_core::error::CommandError;
use bridge_core::{CommandKind, Envelope, EventKind, WireName};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

fn success_subscribers(transport: &ScriptedTransport) -> usize {
    transport.bus().subscriber_count(EventKind::CommandSuccess.encode())
}

/// **VALUE**: Concurrent waits sharing a success kind never cross-resolve.
///
/// **WHY THIS MATTERS**: Every command result arrives as `command_success`.
/// Without the command filter, whichever wait subscribed first would take
/// the other command's result.
///
/// **BUG THIS CATCHES**: Filtering on event kind only, or resolving all
/// waiters with the first envelope.
#[tokio::test]
async fn given_two_waits_on_same_kind_when_results_arrive_out_of_order_then_each_gets_its_own() {
    // GIVEN: Two in-flight commands
    let (transport, registry, correlator) = harness();
    let start = correlator
        .dispatch(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::StartServer, None)
        .await
        .expect("dispatched");
    let stop = correlator
        .dispatch(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::StopClient, None)
        .await
        .expect("dispatched");
    assert_eq!(registry.len(), 2);

    // WHEN: Results arrive in reverse order
    transport.publish(&Envelope::command_success(CommandKind::StopClient, "Client stopped", None));
    transport.publish(&Envelope::command_success(
        CommandKind::StartServer,
        "Server started",
        Some(json!({ "port": 5555 })),
    ));

    // THEN: Each wait holds its own command's result
    let stop = stop.result().await.expect("stop result");
    let start = start.result().await.expect("start result");
    assert_eq!(stop.command, Some(CommandKind::StopClient));
    assert_eq!(start.command, Some(CommandKind::StartServer));
    assert_eq!(start.result(), Some(&json!({ "port": 5555 })));

    // THEN: Nothing left subscribed
    assert!(registry.is_empty());
    assert_eq!(success_subscribers(&transport), 0);
}

/// **VALUE**: A resolved wait never fires twice.
///
/// **BUG THIS CATCHES**: A handler that stays subscribed after delivering.
#[tokio::test]
async fn given_resolved_wait_when_duplicate_result_arrives_then_nobody_listens() {
    let (transport, registry, correlator) = harness();
    transport.respond_with(|_, _| vec![Envelope::command_success(CommandKind::Ping, "pong", None)]);

    let envelope = correlator
        .await_command_result(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::Ping, None)
        .await
        .expect("ping result");

    assert_eq!(envelope.command, Some(CommandKind::Ping));
    assert_eq!(transport.publish(&Envelope::command_success(CommandKind::Ping, "pong", None)), 0);
    assert!(registry.is_empty());
}

/// **VALUE**: A correlated error envelope is a service-reported failure.
///
/// **WHY THIS MATTERS**: Callers must tell "the daemon said no" apart from
/// "the daemon never heard us".
#[tokio::test]
async fn given_error_envelope_when_awaiting_then_service_error_with_daemon_message() {
    let (transport, registry, correlator) = harness();
    transport.respond_with(|_, _| {
        vec![Envelope::command_error(CommandKind::StartClient, "No server selected")]
    });

    let error = correlator
        .await_command_result(
            EventKind::CommandSuccess,
            EventKind::CommandError,
            CommandKind::StartClient,
            None,
        )
        .await
        .expect_err("service error");

    assert!(error.is_service_reported());
    assert!(!error.is_dispatch());
    assert_eq!(error.user_message(), "No server selected");
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
}

/// **VALUE**: A rejected send leaves no listener behind.
///
/// **WHY THIS MATTERS**: The subscription is registered before the send so
/// a fast answer is not missed. If the send fails, no answer will ever
/// come, so the subscription must be removed right away.
///
/// **BUG THIS CATCHES**: Dangling subscriptions after dispatch failures,
/// or reporting them as service errors.
#[tokio::test]
async fn given_rejected_send_when_awaiting_then_dispatch_error_and_no_subscriptions() {
    let (transport, registry, correlator) = harness();
    transport.reject_sends(true);

    let error = correlator
        .await_command_result(
            EventKind::CommandSuccess,
            EventKind::CommandError,
            CommandKind::Status,
            Some(json!({})),
        )
        .await
        .expect_err("dispatch error");

    assert!(error.is_dispatch());
    assert_eq!(error.command(), CommandKind::Status);
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
}

#[tokio::test]
async fn given_params_when_dispatched_then_sent_by_wire_name() {
    let (transport, _registry, correlator) = harness();

    let _pending = correlator
        .dispatch(
            EventKind::CommandSuccess,
            EventKind::CommandError,
            CommandKind::ServiceChoice,
            Some(json!({ "service": "server" })),
        )
        .await
        .expect("dispatched");

    assert_eq!(
        transport.sent(),
        vec![("service_choice".to_string(), Some(json!({ "service": "server" })))]
    );
}

/// **VALUE**: Timing out a wait releases its subscription.
///
/// **BUG THIS CATCHES**: A timed-out wait whose key stays registered, so
/// every timeout leaks one listener.
#[tokio::test]
async fn given_no_answer_when_result_within_then_timeout_and_registry_empty() {
    let (transport, registry, correlator) = harness();
    let pending = correlator
        .dispatch(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::Status, None)
        .await
        .expect("dispatched");
    let key = pending.key().to_string();
    assert!(registry.contains(&key));

    let error = pending
        .result_within(Duration::from_millis(20))
        .await
        .expect_err("timeout");

    assert!(matches!(error, CommandError::Timeout { .. }));
    assert!(!registry.contains(&key));
    assert_eq!(transport.bus().total_subscribers(), 0);
}

/// **VALUE**: Force-releasing a wait's key cancels the wait.
///
/// **BUG THIS CATCHES**: A waiter left suspended forever after its
/// subscription was torn down.
#[tokio::test]
async fn given_force_released_key_when_awaiting_then_cancelled() {
    let (transport, registry, correlator) = harness();
    let pending = correlator
        .dispatch(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::Status, None)
        .await
        .expect("dispatched");

    assert!(registry.force_release(pending.key()));
    let error = pending.result().await.expect_err("cancelled");

    assert!(matches!(error, CommandError::Cancelled { .. }));
    assert_eq!(transport.bus().total_subscribers(), 0);
}

#[tokio::test]
async fn given_abandoned_wait_when_dropped_then_key_released() {
    let (transport, registry, correlator) = harness();
    let pending = correlator
        .dispatch(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::Status, None)
        .await
        .expect("dispatched");

    drop(pending);

    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
}

/// **VALUE**: Error watches are shared and filtered by command.
///
/// **WHY THIS MATTERS**: Every mount of a view asks for the same watch;
/// only one transport subscription should exist.
#[tokio::test]
async fn given_repeated_error_watch_when_errors_arrive_then_single_listener_filtered_by_command() {
    let (transport, registry, correlator) = harness();
    let seen = Arc::new(AtomicUsize::new(0));

    let keys: Vec<String> = (0..2)
        .map(|_| {
            let seen = Arc::clone(&seen);
            correlator.watch_errors(EventKind::CommandError, CommandKind::StartServer, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    assert_eq!(keys[0], keys[1]);
    assert_eq!(transport.bus().subscriber_count("command_error"), 1);

    transport.publish(&Envelope::command_error(CommandKind::StartServer, "port in use"));
    transport.publish(&Envelope::command_error(CommandKind::StartClient, "not for us"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    assert!(registry.release(&keys[0]));
    assert_eq!(transport.bus().subscriber_count("command_error"), 0);
}

/// **VALUE**: A wait abandoned while its send is still in flight leaves
/// nothing registered.
///
/// **WHY THIS MATTERS**: Callers race `await_command_result` against their
/// own timers. A daemon that stopped reading keeps the send pending, so the
/// caller gives up before a `PendingCommand` is ever handed back.
///
/// **BUG THIS CATCHES**: Registering the wait key before the send without a
/// guard, so dropping the future mid-send leaks the key and both handlers.
#[tokio::test]
async fn given_stalled_send_when_caller_gives_up_then_wait_key_and_handlers_released() {
    // GIVEN: A transport whose sends never complete
    let (transport, registry, correlator) = harness();
    transport.stall_sends(true);

    // WHEN: The caller stops waiting mid-send
    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        correlator.await_command_result(
            EventKind::CommandSuccess,
            EventKind::CommandError,
            CommandKind::Status,
            None,
        ),
    )
    .await;

    // THEN: The wait timed out and left no registration behind
    assert!(outcome.is_err());
    assert!(registry.is_empty());
    assert_eq!(transport.bus().total_subscribers(), 0);
}
