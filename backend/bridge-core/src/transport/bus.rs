use crate::event::{Envelope, WireName};
use crate::transport::{EventHandler, Unsubscribe};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use parking_lot::Mutex;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, Vec<(u64, EventHandler)>>>,
}

impl BusInner {
    fn remove(&self, event: &str, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(handlers) = subscribers.get_mut(event) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                subscribers.remove(event);
            }
        }
    }
}

/// Delivers every published envelope to all handlers subscribed to its wire
/// name, in subscription order.
///
/// Handlers run without the subscriber lock held, so they are free to
/// subscribe or unsubscribe (including themselves) while being called.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: &str, handler: EventHandler) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        trace!("Handler {id} subscribed to '{event}'");

        let weak = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(&event, id);
                trace!("Handler {id} unsubscribed from '{event}'");
            }
        })
    }

    /// Returns how many handlers saw the envelope.
    pub fn publish(&self, envelope: &Envelope) -> usize {
        let handlers: Vec<EventHandler> = self
            .inner
            .subscribers
            .lock()
            .get(envelope.kind.encode())
            .map(|handlers| handlers.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(event)
            .map_or(0, Vec::len)
    }

    pub fn total_subscribers(&self) -> usize {
        self.inner.subscribers.lock().values().map(Vec::len).sum()
    }
}
