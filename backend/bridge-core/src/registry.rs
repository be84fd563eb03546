//! Reference-counted map of logical subscription keys.
//!
//! Every key held here is backed by exactly one live transport subscription,
//! represented by the release function stored with it. Keys are shared by
//! any number of logical subscribers; the transport subscription is dropped
//! when the last of them releases, or immediately on a forced release.
//!
//! # Invariants
//!
//! - A stored release function runs at most once (it is an `FnOnce`, moved
//!   out of the map before it is called).
//! - No entry ever has a reference count of zero.
//! - Release functions run outside the registry lock, so they may call back
//!   into the registry or the transport.
//!
//! A registry is scoped to its owner. When the last handle is dropped, every
//! remaining entry is released.

use crate::diagnostics::{Diagnostic, Diagnostics};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::Mutex;

/// Tears down one underlying transport subscription.
pub type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

struct SubscriptionEntry {
    release: ReleaseFn,
    ref_count: usize,
}

struct RegistryInner {
    entries: Mutex<HashMap<String, SubscriptionEntry>>,
    diagnostics: Diagnostics,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let entries: Vec<_> = self.entries.get_mut().drain().collect();
        if !entries.is_empty() {
            debug!("Registry dropped, releasing {} subscriptions", entries.len());
        }
        for (_, entry) in entries {
            (entry.release)();
        }
    }
}

#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

/// Non-owning handle, held by transport handlers so a registry is not kept
/// alive by the subscriptions it owns.
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<SubscriptionRegistry> {
        self.inner
            .upgrade()
            .map(|inner| SubscriptionRegistry { inner })
    }
}

impl SubscriptionRegistry {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(HashMap::new()),
                diagnostics,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register `key`, or join it if it already exists.
    ///
    /// When the key exists its count is incremented and the caller's
    /// `release` runs immediately: the first registrant's subscription
    /// already serves everyone. Returns the resulting reference count.
    pub fn add_shared(&self, key: impl Into<String>, release: impl FnOnce() + Send + 'static) -> usize {
        let key = key.into();
        let (redundant, ref_count): (Option<ReleaseFn>, usize) = {
            let mut entries = self.inner.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    entry.ref_count += 1;
                    (Some(Box::new(release)), entry.ref_count)
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(SubscriptionEntry {
                        release: Box::new(release),
                        ref_count: 1,
                    });
                    (None, 1)
                }
            }
        };

        trace!("Subscription '{key}' now has {ref_count} holders");
        if let Some(release) = redundant {
            release();
        }
        ref_count
    }

    /// Register `key` only if it is absent.
    ///
    /// A redundant registration runs its own `release` immediately and leaves
    /// the existing entry (and its count) untouched. Returns whether the
    /// registration was stored.
    pub fn add_once(&self, key: impl Into<String>, release: impl FnOnce() + Send + 'static) -> bool {
        let key = key.into();
        let redundant: Option<ReleaseFn> = {
            let mut entries = self.inner.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Occupied(_) => Some(Box::new(release)),
                Entry::Vacant(vacant) => {
                    vacant.insert(SubscriptionEntry {
                        release: Box::new(release),
                        ref_count: 1,
                    });
                    None
                }
            }
        };

        match redundant {
            Some(release) => {
                trace!("Subscription '{key}' already registered, dropping duplicate");
                release();
                false
            }
            None => {
                trace!("Subscription '{key}' registered");
                true
            }
        }
    }

    /// Drop one holder of `key`; the last holder tears the subscription down.
    ///
    /// An unknown key is reported on the diagnostics channel and otherwise
    /// ignored. Returns whether the underlying subscription was torn down.
    pub fn release(&self, key: &str) -> bool {
        enum Outcome {
            Missing,
            Decremented(usize),
            Removed(ReleaseFn),
        }

        let outcome = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(key) {
                None => Outcome::Missing,
                Some(entry) if entry.ref_count > 1 => {
                    entry.ref_count -= 1;
                    Outcome::Decremented(entry.ref_count)
                }
                Some(_) => match entries.remove(key) {
                    Some(entry) => Outcome::Removed(entry.release),
                    None => Outcome::Missing,
                },
            }
        };

        match outcome {
            Outcome::Missing => {
                self.inner.diagnostics.report(Diagnostic::UnknownSubscriptionKey {
                    key: key.to_string(),
                });
                false
            }
            Outcome::Decremented(remaining) => {
                trace!("Subscription '{key}' released, {remaining} holders remain");
                false
            }
            Outcome::Removed(release) => {
                debug!("Subscription '{key}' torn down");
                release();
                true
            }
        }
    }

    /// Tear `key` down regardless of its count.
    ///
    /// Used when unwinding errors and cancelling waits. A missing key is a
    /// silent no-op. Returns whether anything was torn down.
    pub fn force_release(&self, key: &str) -> bool {
        let removed = self.inner.entries.lock().remove(key);
        match removed {
            Some(entry) => {
                debug!(
                    "Subscription '{key}' force-released ({} holders dropped)",
                    entry.ref_count
                );
                (entry.release)();
                true
            }
            None => false,
        }
    }

    /// Tear down every subscription. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let drained: Vec<_> = self.inner.entries.lock().drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            (entry.release)();
        }
        if count > 0 {
            debug!("Released all {count} subscriptions");
        }
        count
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.inner.entries.lock().get(key).map(|entry| entry.ref_count)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }
}
