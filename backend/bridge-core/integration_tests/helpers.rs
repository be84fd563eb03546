//! Test helpers for bridge integration tests.
//!
//! - [`ScriptedTransport`]: in-memory transport that records sends, can be
//!   told to reject or stall them, and can answer commands with scripted
//!   envelopes
//! - [`wait_until`]: poll a condition while spawned tasks make progress

use bridge_core::error::TransportError;
use bridge_core::{Correlator, Diagnostics, Envelope, EventBus, SubscriptionRegistry, Transport};
use bridge_core::transport::{EventHandler, Unsubscribe};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

type Responder = Box<dyn Fn(&str, Option<&Value>) -> Vec<Envelope> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedTransport {
    bus: EventBus,
    sent: Mutex<Vec<(String, Option<Value>)>>,
    reject_sends: AtomicBool,
    stall_sends: AtomicBool,
    responder: Mutex<Option<Responder>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `envelope` to current subscribers, as the daemon would.
    pub fn publish(&self, envelope: &Envelope) -> usize {
        self.bus.publish(envelope)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn sent(&self) -> Vec<(String, Option<Value>)> {
        self.sent.lock().clone()
    }

    pub fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Make sends never complete, like a daemon that stopped reading.
    pub fn stall_sends(&self, stall: bool) {
        self.stall_sends.store(stall, Ordering::SeqCst);
    }

    /// Answer every accepted send with the envelopes `respond` returns.
    pub fn respond_with(
        &self,
        respond: impl Fn(&str, Option<&Value>) -> Vec<Envelope> + Send + Sync + 'static,
    ) {
        *self.responder.lock() = Some(Box::new(respond));
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, command: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(TransportError::send("daemon unreachable"));
        }
        if self.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.sent.lock().push((command.to_string(), params.clone()));

        let responses = match self.responder.lock().as_ref() {
            Some(respond) => respond(command, params.as_ref()),
            None => Vec::new(),
        };
        for envelope in &responses {
            self.bus.publish(envelope);
        }
        Ok(())
    }

    fn subscribe(&self, event: &str, handler: EventHandler) -> Unsubscribe {
        self.bus.subscribe(event, handler)
    }
}

/// Fresh transport, registry (with its diagnostics) and correlator.
pub fn harness() -> (
    Arc<ScriptedTransport>,
    SubscriptionRegistry,
    Correlator<ScriptedTransport>,
) {
    let transport = ScriptedTransport::new();
    let registry = SubscriptionRegistry::new(Diagnostics::new());
    let correlator = Correlator::new(Arc::clone(&transport), registry.clone());
    (transport, registry, correlator)
}

/// Yield until `condition` holds; panics after one second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 1s");
}
