//! Command/result correlation over a broadcast-style transport.
//!
//! The transport hands every notification to every subscriber, so a command's
//! answer has to be picked out of the stream by its `command` discriminator.
//! Each wait gets a private registry key backed by one subscription on the
//! success kind and one on the error kind; whichever matching envelope
//! arrives first resolves the wait and tears both subscriptions down.
//!
//! Every exit path releases the key:
//! - a matching envelope releases it from inside the handler
//! - a rejected send force-releases it before the error is returned
//! - dropping an unresolved [`PendingCommand`] force-releases it, including
//!   while the send itself is still in flight

use crate::error::CommandError;
use crate::event::{CommandKind, Envelope, EventKind, WireName};
use crate::registry::{SubscriptionRegistry, WeakRegistry};
use crate::transport::{EventHandler, Transport, Unsubscribe};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

type Outcome = Result<Envelope, CommandError>;
type OutcomeSlot = Arc<Mutex<Option<oneshot::Sender<Outcome>>>>;

pub struct Correlator<T: Transport> {
    transport: Arc<T>,
    registry: SubscriptionRegistry,
}

impl<T: Transport> Clone for Correlator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            registry: self.registry.clone(),
        }
    }
}

impl<T: Transport> Correlator<T> {
    pub fn new(transport: Arc<T>, registry: SubscriptionRegistry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Send `command` and wait for its correlated result.
    ///
    /// Resolves with the first `success` envelope whose `command` matches.
    /// A matching `error` envelope becomes [`CommandError::Service`]; a
    /// rejected send becomes [`CommandError::Dispatch`].
    pub async fn await_command_result(
        &self,
        success: EventKind,
        error: EventKind,
        command: CommandKind,
        params: Option<Value>,
    ) -> Result<Envelope, CommandError> {
        self.dispatch(success, error, command, params)
            .await?
            .result()
            .await
    }

    /// Send `command` and return the wait without suspending on it.
    pub async fn dispatch(
        &self,
        success: EventKind,
        error: EventKind,
        command: CommandKind,
        params: Option<Value>,
    ) -> Result<PendingCommand, CommandError> {
        self.dispatch_filtered(success, error, command, params, |_| true)
            .await
    }

    /// Like [`Correlator::dispatch`], but success envelopes must also pass
    /// `accept`. Error envelopes are matched on `command` alone.
    pub async fn dispatch_filtered(
        &self,
        success: EventKind,
        error: EventKind,
        command: CommandKind,
        params: Option<Value>,
        accept: impl Fn(&Envelope) -> bool + Send + Sync + 'static,
    ) -> Result<PendingCommand, CommandError> {
        let key = format!("command:{}:{}", command.encode(), Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        let slot: OutcomeSlot = Arc::new(Mutex::new(Some(tx)));
        let weak = self.registry.downgrade();

        let success_handler = {
            let slot = Arc::clone(&slot);
            let weak = weak.clone();
            let key = key.clone();
            let handler: EventHandler = Arc::new(move |envelope: &Envelope| {
                if envelope.command != Some(command) || !accept(envelope) {
                    return;
                }
                deliver(&slot, &weak, &key, Ok(envelope.clone()));
            });
            handler
        };
        let mut unsubscribes: Vec<Unsubscribe> =
            vec![self.transport.subscribe(success.encode(), success_handler)];

        if error != success {
            let slot = Arc::clone(&slot);
            let weak = weak.clone();
            let key = key.clone();
            let error_handler: EventHandler = Arc::new(move |envelope: &Envelope| {
                if envelope.command != Some(command) {
                    return;
                }
                let message = envelope
                    .error_message()
                    .unwrap_or("service reported an error without a message");
                deliver(
                    &slot,
                    &weak,
                    &key,
                    Err(CommandError::service(command, message)),
                );
            });
            unsubscribes.push(self.transport.subscribe(error.encode(), error_handler));
        }

        let release_slot = Arc::clone(&slot);
        let stored = self.registry.add_once(key.clone(), move || {
            for unsubscribe in unsubscribes {
                unsubscribe();
            }
            // Whoever is still waiting now sees a closed channel.
            release_slot.lock().take();
        });
        if !stored {
            warn!("Wait key '{key}' collided with a live registration");
        }

        // Held across the send so an abandoned dispatch still releases the key.
        let pending = PendingCommand {
            key,
            command,
            rx,
            registry: self.registry.clone(),
        };

        trace!("Dispatching '{}' under '{}'", command.encode(), pending.key);
        if let Err(e) = self.transport.send(command.encode(), params).await {
            debug!("Dispatch of '{}' failed: {e}", command.encode());
            pending.cancel();
            return Err(CommandError::dispatch(command, e.to_string()));
        }

        Ok(pending)
    }

    /// Listen for `error_kind` envelopes about `command` without blocking.
    ///
    /// Registered under a stable key with `add_once`, so any number of
    /// callers may ask for the same watch and only one transport
    /// subscription exists. Returns the key to `release` when done.
    pub fn watch_errors(
        &self,
        error_kind: EventKind,
        command: CommandKind,
        on_error: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> String {
        let key = format!("errors:{}:{}", error_kind.encode(), command.encode());
        let handler: EventHandler = Arc::new(move |envelope: &Envelope| {
            if envelope.command == Some(command) {
                on_error(envelope);
            }
        });
        let unsubscribe = self.transport.subscribe(error_kind.encode(), handler);
        self.registry.add_once(key.clone(), unsubscribe);
        key
    }
}

fn deliver(slot: &OutcomeSlot, registry: &WeakRegistry, key: &str, outcome: Outcome) {
    let Some(tx) = slot.lock().take() else {
        return;
    };
    // A receiver that already went away is not an error
    let _ = tx.send(outcome);
    if let Some(registry) = registry.upgrade() {
        registry.release(key);
    }
}

/// A dispatched command whose result has not been observed yet.
///
/// Dropping it before the result arrives force-releases the wait.
pub struct PendingCommand {
    key: String,
    command: CommandKind,
    rx: oneshot::Receiver<Outcome>,
    registry: SubscriptionRegistry,
}

impl PendingCommand {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn command(&self) -> CommandKind {
        self.command
    }

    /// Wait for the correlated result.
    ///
    /// Resolves to [`CommandError::Cancelled`] if the key is force-released
    /// before a matching envelope arrives.
    pub async fn result(mut self) -> Result<Envelope, CommandError> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CommandError::cancelled(self.command)),
        }
    }

    /// Wait at most `timeout`; on expiry the wait is force-released.
    pub async fn result_within(mut self, timeout: Duration) -> Result<Envelope, CommandError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CommandError::cancelled(self.command)),
            Err(_) => {
                self.registry.force_release(&self.key);
                Err(CommandError::timeout(self.command, timeout))
            }
        }
    }

    pub fn cancel(self) {
        self.registry.force_release(&self.key);
    }
}

impl Drop for PendingCommand {
    fn drop(&mut self) {
        if self.registry.force_release(&self.key) {
            trace!("Abandoned wait '{}' released", self.key);
        }
    }
}
