use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::RosterError;
use crate::event::{Envelope, EventKind, WireName};
use crate::registry::SubscriptionRegistry;
use crate::roster::{ClientRecord, Observation, Roster};
use crate::transport::{EventHandler, Transport};

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

const FEEDS: [(EventKind, bool); 2] = [
    (EventKind::ClientConnected, true),
    (EventKind::ClientDisconnected, false),
];

fn feed_key(kind: EventKind) -> String {
    format!("roster:{}", kind.encode())
}

/// Keeps a [`Roster`] current from `client_connected` and
/// `client_disconnected` notifications.
///
/// Any number of views may [`attach`](RosterFeed::attach); they share one
/// transport subscription per notification kind, which is dropped when the
/// last of them [`detach`](RosterFeed::detach)es.
pub struct RosterFeed<T: Transport> {
    transport: Arc<T>,
    registry: SubscriptionRegistry,
    roster: Arc<Mutex<Roster>>,
}

impl<T: Transport> Clone for RosterFeed<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            registry: self.registry.clone(),
            roster: Arc::clone(&self.roster),
        }
    }
}

impl<T: Transport> RosterFeed<T> {
    pub fn new(transport: Arc<T>, registry: SubscriptionRegistry) -> Self {
        Self {
            transport,
            registry,
            roster: Arc::new(Mutex::new(Roster::new())),
        }
    }

    /// Join the feed. Returns how many views now share it.
    pub fn attach(&self) -> usize {
        let mut holders = 0;
        for (kind, online) in FEEDS {
            let handler = self.handler(online);
            let unsubscribe = self.transport.subscribe(kind.encode(), handler);
            holders = self.registry.add_shared(feed_key(kind), unsubscribe);
        }
        debug!("Roster feed attached ({holders} views)");
        holders
    }

    /// Leave the feed. Returns true when this was the last view and the
    /// transport subscriptions were dropped.
    pub fn detach(&self) -> bool {
        let mut torn_down = false;
        for (kind, _) in FEEDS {
            torn_down |= self.registry.release(&feed_key(kind));
        }
        torn_down
    }

    pub fn is_attached(&self) -> bool {
        FEEDS
            .iter()
            .all(|(kind, _)| self.registry.contains(&feed_key(*kind)))
    }

    fn handler(&self, online: bool) -> EventHandler {
        let roster = Arc::clone(&self.roster);
        let diagnostics = self.registry.diagnostics().clone();
        Arc::new(move |envelope: &Envelope| {
            observe(&roster, &diagnostics, envelope, online);
        })
    }

    pub fn records(&self) -> Vec<ClientRecord> {
        self.roster.lock().records().to_vec()
    }

    pub fn get(&self, identity_key: &str) -> Option<ClientRecord> {
        self.roster.lock().get(identity_key).cloned()
    }

    /// Apply an observation directly, as a notification would.
    pub fn reconcile(
        &self,
        observation: &Observation,
        online: bool,
    ) -> Result<Vec<ClientRecord>, RosterError> {
        self.roster
            .lock()
            .reconcile(observation, online)
            .map(<[ClientRecord]>::to_vec)
    }

    pub fn remove(&self, identity_key: &str) -> Result<ClientRecord, RosterError> {
        let removed = self.roster.lock().remove(identity_key)?;
        info!("Removed client '{identity_key}' from roster");
        Ok(removed)
    }

    pub fn reset(&self) {
        self.roster.lock().reset();
        info!("Roster reset");
    }
}

fn observe(roster: &Mutex<Roster>, diagnostics: &Diagnostics, envelope: &Envelope, online: bool) {
    let observation = envelope
        .payload
        .as_ref()
        .map(Observation::from_payload)
        .unwrap_or_default();

    match roster.lock().reconcile(&observation, online) {
        Ok(records) => debug!(
            "Client {} is {} ({} known)",
            observation
                .uid
                .as_deref()
                .or(observation.address.as_deref())
                .or(observation.hostname.as_deref())
                .unwrap_or_default(),
            if online { "online" } else { "offline" },
            records.len()
        ),
        Err(RosterError::Unidentifiable { .. }) => {
            diagnostics.report(Diagnostic::UnidentifiableClient);
        }
        Err(e) => diagnostics.report(Diagnostic::UndecodableEvent {
            reason: e.to_string(),
        }),
    }
}
