//! The duplex channel to the background daemon.
//!
//! [`Transport`] is the seam the rest of the crate is written against:
//! `send` a command by wire name, `subscribe` a handler to a notification
//! wire name. [`EventBus`] is the fan-out table every implementation uses to
//! deliver notifications; [`DaemonLink`] is the socket-backed implementation.

mod bus;
pub mod framing;
mod link;

pub use bus::EventBus;
pub use link::DaemonLink;

use crate::error::TransportError;
use crate::event::Envelope;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

/// Callback invoked for each envelope delivered on a subscribed wire name.
pub type EventHandler = Arc<dyn Fn(&Envelope) + Send + Sync + 'static>;

/// Removes one subscription from the transport.
pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

pub trait Transport: Send + Sync + 'static {
    /// Send `command` (a wire name) with optional structured parameters.
    ///
    /// Resolves once the command has been handed to the daemon; the daemon's
    /// answer arrives later as a notification.
    fn send(
        &self,
        command: &str,
        params: Option<Value>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Deliver every envelope whose kind encodes to `event` to `handler`.
    fn subscribe(&self, event: &str, handler: EventHandler) -> Unsubscribe;
}
