//! Side channel for non-fatal problems.
//!
//! Protocol inconsistencies (releasing an unknown registry key, undecodable
//! traffic) and user-facing failures (a mode switch that was reverted) are
//! logged here and broadcast to whoever listens. Nothing in this module
//! returns an error to the code that reported the problem.

use crate::mode::ServiceMode;

use log::{error, warn};
use tokio::sync::broadcast;

const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// `release` was called for a key the registry does not hold.
    UnknownSubscriptionKey { key: String },

    /// A frame or notification could not be decoded and was skipped.
    UndecodableEvent { reason: String },

    /// A client observation carried nothing to identify it by.
    UnidentifiableClient,

    /// A mode switch failed and the visible mode was reverted.
    ModeSwitchFailed { target: ServiceMode, reason: String },
}

/// Cloneable reporter; all clones feed the same broadcast channel.
#[derive(Clone)]
pub struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DIAGNOSTIC_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::UnknownSubscriptionKey { key } => {
                warn!("Release requested for unknown subscription key '{key}'");
            }
            Diagnostic::UndecodableEvent { reason } => {
                warn!("Skipping undecodable event: {reason}");
            }
            Diagnostic::UnidentifiableClient => {
                warn!("Ignoring client observation without uid, address or hostname");
            }
            Diagnostic::ModeSwitchFailed { target, reason } => {
                error!("Switch to {target} mode failed: {reason}");
            }
        }

        // No listeners is fine: the log line above is the record.
        let _ = self.tx.send(diagnostic);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
