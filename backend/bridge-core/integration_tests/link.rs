//! End-to-end tests against a fake daemon on a loopback socket.

use bridge_core::config::LinkConfig;
use bridge_core::error::{CommandError, TransportError};
use bridge_core::event::WireCommand;
use bridge_core::transport::framing::{Frame, LineFrameCodec};
use bridge_core::{
    CommandKind, Correlator, DaemonLink, Diagnostic, Diagnostics, Envelope, EventKind,
    SubscriptionRegistry, Transport,
};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

async fn listener() -> (TcpListener, LinkConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let config = LinkConfig {
        port,
        connect_initial_delay_ms: 10,
        connect_max_elapsed_secs: 1,
        ..LinkConfig::default()
    };
    (listener, config)
}

async fn accept(listener: &TcpListener) -> Framed<TcpStream, LineFrameCodec> {
    let (stream, _) = listener.accept().await.expect("accept");
    Framed::new(stream, LineFrameCodec::new())
}

async fn next_command(daemon: &mut Framed<TcpStream, LineFrameCodec>) -> WireCommand {
    match daemon.next().await {
        Some(Ok(Frame::Text(line))) => serde_json::from_str(&line).expect("command json"),
        other => panic!("expected a command frame, got {other:?}"),
    }
}

async fn send_envelope(daemon: &mut Framed<TcpStream, LineFrameCodec>, envelope: &Envelope) {
    let line = serde_json::to_string(&envelope.to_wire()).expect("serialise");
    daemon.send(line).await.expect("daemon send");
}

/// **VALUE**: A command travels to the daemon and its answer resolves the wait.
///
/// **WHY THIS MATTERS**: This is the whole path: framing, command encoding,
/// notification decoding, bus fan-out and correlation.
///
/// **BUG THIS CATCHES**: Framing mismatches between writer and reader, or
/// notifications decoded but never published.
#[tokio::test]
async fn given_fake_daemon_when_status_awaited_then_result_arrives_over_socket() {
    // GIVEN: A daemon that answers one status command
    let (listener, config) = listener().await;
    let daemon = tokio::spawn(async move {
        let mut daemon = accept(&listener).await;
        let command = next_command(&mut daemon).await;
        assert_eq!(command.command, "status");
        send_envelope(
            &mut daemon,
            &Envelope::command_success(
                CommandKind::Status,
                "Status retrieved",
                Some(json!({ "server_info": { "running": true } })),
            ),
        )
        .await;
        daemon
    });

    // WHEN: Connected and awaited
    let link = Arc::new(DaemonLink::connect(&config, Diagnostics::new()).await.expect("connect"));
    let registry = SubscriptionRegistry::new(Diagnostics::new());
    let correlator = Correlator::new(Arc::clone(&link), registry.clone());
    let envelope = correlator
        .await_command_result(EventKind::CommandSuccess, EventKind::CommandError, CommandKind::Status, None)
        .await
        .expect("status result");

    // THEN: Result decoded, nothing left registered
    assert_eq!(envelope.result(), Some(&json!({ "server_info": { "running": true } })));
    assert!(registry.is_empty());
    let _daemon = daemon.await.expect("daemon task");
}

/// **VALUE**: Bad traffic is reported and skipped; the link keeps reading.
///
/// **BUG THIS CATCHES**: The reader task ending on the first undecodable
/// frame, silently disconnecting the UI.
#[tokio::test]
async fn given_garbage_then_valid_frame_when_read_then_reported_and_valid_delivered() {
    let (listener, config) = listener().await;
    let diagnostics = Diagnostics::new();
    let mut reports = diagnostics.subscribe();
    let link = DaemonLink::connect(&config, diagnostics).await.expect("connect");
    let mut daemon = accept(&listener).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _unsubscribe = link.subscribe(
        "pong",
        Arc::new(move |envelope: &Envelope| {
            let _ = tx.send(envelope.kind);
        }),
    );

    daemon
        .send(json!({ "event_type": "solar_flare" }).to_string())
        .await
        .expect("daemon send");
    send_envelope(&mut daemon, &Envelope::new(EventKind::Pong)).await;

    let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("pong within 1s");
    assert_eq!(delivered, Some(EventKind::Pong));
    assert!(matches!(
        reports.try_recv(),
        Ok(Diagnostic::UndecodableEvent { .. })
    ));
    assert!(!link.is_closed());
}

#[tokio::test]
async fn given_no_daemon_when_connecting_then_connect_error_after_backoff() {
    let (listener, config) = listener().await;
    drop(listener);

    let result = DaemonLink::connect(&config, Diagnostics::new()).await;

    assert!(matches!(result, Err(TransportError::Connect { .. })));
}

#[tokio::test]
async fn given_shut_down_link_when_sending_then_closed_and_dispatch_error() {
    let (listener, config) = listener().await;
    let link = Arc::new(DaemonLink::connect(&config, Diagnostics::new()).await.expect("connect"));
    let _daemon = accept(&listener).await;

    link.shutdown();

    assert!(link.is_closed());
    assert!(matches!(
        link.send("ping", None).await,
        Err(TransportError::Closed { .. })
    ));

    let correlator = Correlator::new(Arc::clone(&link), SubscriptionRegistry::new(Diagnostics::new()));
    let error = correlator
        .await_command_result(EventKind::Pong, EventKind::CommandError, CommandKind::Ping, None)
        .await
        .expect_err("dispatch failure");
    assert!(matches!(error, CommandError::Dispatch { .. }));
}

#[tokio::test]
async fn given_daemon_hangs_up_when_reading_then_link_marked_closed() {
    let (listener, config) = listener().await;
    let link = DaemonLink::connect(&config, Diagnostics::new()).await.expect("connect");
    drop(accept(&listener).await);

    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while !link.is_closed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(closed.is_ok());
}
