//! Wire vocabulary shared with the background daemon.
//!
//! - [`EventKind`] / [`CommandKind`]: closed sets of notification and command names
//! - [`WireName`]: the symbolic-name ↔ wire-name codec
//! - [`Envelope`]: a validated notification, the unit handed to subscribers
//! - [`WireEvent`] / [`WireCommand`]: raw JSON shapes on the socket

mod envelope;
mod kind;

pub use envelope::{Envelope, WireCommand, WireEvent};
pub use kind::{CommandKind, EventKind, WireName};
