//! Drives [`ModeState`] from local switch requests and daemon reports.
//!
//! Every transition bumps a generation counter. A wait only commits or
//! reverts if the generation it started under is still current, which is how
//! a newer request, a status snapshot or [`ModeCoordinator::cancel`]
//! supersedes it. The superseding path force-releases the old wait's
//! registry key, so at most one wait key is live at a time.

use crate::correlator::Correlator;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{CommandError, ModeError};
use crate::event::{CommandKind, Envelope, EventKind, WireName};
use crate::mode::{ActiveService, ModeState, ServiceMode, StatusSnapshot};
use crate::registry::SubscriptionRegistry;
use crate::transport::{EventHandler, Transport};

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::watch;

const SERVICE_STARTED_KEY: &str = "mode:service_started";
const SERVICE_PARAM: &str = "service";
const SERVICE_NAME_FIELD: &str = "service_name";

struct ModeInner {
    state: ModeState,
    generation: u64,
    wait_key: Option<String>,
}

struct Shared {
    inner: Mutex<ModeInner>,
    tx: watch::Sender<ModeState>,
}

impl Shared {
    /// Start a switch. `None` when `target` is already the stable mode.
    fn begin(&self, target: ServiceMode) -> Option<(u64, Option<String>)> {
        let mut inner = self.inner.lock();
        if inner.state.stable() == Some(target) {
            return None;
        }

        let previous = inner.state.stable().or(inner.state.previous_service);
        inner.generation += 1;
        inner.state = ModeState {
            active_service: ActiveService::Pending(Some(target)),
            previous_service: previous,
        };
        self.tx.send_replace(inner.state);
        Some((inner.generation, inner.wait_key.take()))
    }

    /// Record the wait key for `generation`; false if it was superseded.
    fn track(&self, generation: u64, key: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.wait_key = Some(key.to_string());
        true
    }

    fn commit(&self, generation: u64, target: ServiceMode) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.wait_key = None;
        inner.state = ModeState {
            active_service: target.into(),
            previous_service: inner.state.previous_service,
        };
        self.tx.send_replace(inner.state);
        true
    }

    fn revert(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.wait_key = None;
        Self::revert_locked(&mut inner);
        self.tx.send_replace(inner.state);
        true
    }

    fn revert_locked(inner: &mut ModeInner) {
        inner.state = ModeState {
            active_service: inner
                .state
                .previous_service
                .map(ActiveService::from)
                .unwrap_or(ActiveService::Pending(None)),
            previous_service: None,
        };
    }

    /// Adopt `mode` as observed truth, superseding any in-flight wait.
    fn observe(&self, registry: &SubscriptionRegistry, mode: ServiceMode) {
        let stale_key = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            let current = inner.state.stable();
            let previous = match current {
                Some(current) if current != mode => Some(current),
                _ => inner.state.previous_service.filter(|previous| *previous != mode),
            };
            inner.state = ModeState {
                active_service: mode.into(),
                previous_service: previous,
            };
            self.tx.send_replace(inner.state);
            inner.wait_key.take()
        };

        if let Some(key) = stale_key {
            debug!("Observed {mode} mode, dropping in-flight wait '{key}'");
            registry.force_release(&key);
        }
    }
}

/// Reverts a switch whose caller stopped waiting for it.
///
/// Armed for the whole wait; every path that reaches a result disarms it.
/// If it drops armed and its generation is still current, the visible mode
/// goes back to the last stable one and the wait key is force-released.
struct SwitchGuard<'a> {
    shared: &'a Shared,
    registry: &'a SubscriptionRegistry,
    generation: u64,
    armed: bool,
}

impl SwitchGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let stale_key = {
            let mut inner = self.shared.inner.lock();
            if inner.generation != self.generation {
                return;
            }
            inner.generation += 1;
            Shared::revert_locked(&mut inner);
            self.shared.tx.send_replace(inner.state);
            inner.wait_key.take()
        };

        debug!("Mode switch abandoned by its caller, reverted");
        if let Some(key) = stale_key {
            self.registry.force_release(&key);
        }
    }
}

/// The mode a `service_choice` success reports.
fn reported_mode(envelope: &Envelope) -> Option<ServiceMode> {
    envelope
        .result()
        .and_then(|result| {
            result
                .as_str()
                .or_else(|| result.get(SERVICE_PARAM).and_then(Value::as_str))
        })
        .or(envelope.message.as_deref())
        .and_then(|name| name.parse().ok())
}

pub struct ModeCoordinator<T: Transport> {
    correlator: Correlator<T>,
    shared: Arc<Shared>,
    diagnostics: Diagnostics,
}

impl<T: Transport> Clone for ModeCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            correlator: self.correlator.clone(),
            shared: Arc::clone(&self.shared),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<T: Transport> ModeCoordinator<T> {
    /// Starts in `Pending(None)` until a snapshot or report says otherwise.
    pub fn new(correlator: Correlator<T>) -> Self {
        let state = ModeState::default();
        let (tx, _) = watch::channel(state);
        let diagnostics = correlator.registry().diagnostics().clone();
        Self {
            correlator,
            shared: Arc::new(Shared {
                inner: Mutex::new(ModeInner {
                    state,
                    generation: 0,
                    wait_key: None,
                }),
                tx,
            }),
            diagnostics,
        }
    }

    pub fn state(&self) -> ModeState {
        self.shared.inner.lock().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ModeState> {
        self.shared.tx.subscribe()
    }

    /// Registry key of the in-flight switch, if any.
    pub fn wait_key(&self) -> Option<String> {
        self.shared.inner.lock().wait_key.clone()
    }

    /// Switch to `target` and wait for the daemon to confirm it.
    ///
    /// Requesting the current stable mode is a no-op. A request made while
    /// another is pending supersedes it; the older call returns
    /// [`ModeError::Superseded`]. On failure the visible mode reverts to the
    /// last stable one and a [`Diagnostic::ModeSwitchFailed`] is reported.
    pub async fn request_mode(&self, target: ServiceMode) -> Result<ServiceMode, ModeError> {
        self.switch(target, None).await
    }

    /// [`ModeCoordinator::request_mode`] bounded by `timeout`. On expiry the
    /// wait is released and the mode reverts.
    pub async fn request_mode_within(
        &self,
        target: ServiceMode,
        timeout: Duration,
    ) -> Result<ServiceMode, ModeError> {
        self.switch(target, Some(timeout)).await
    }

    async fn switch(
        &self,
        target: ServiceMode,
        timeout: Option<Duration>,
    ) -> Result<ServiceMode, ModeError> {
        let Some((generation, stale_key)) = self.shared.begin(target) else {
            debug!("Already in {target} mode");
            return Ok(target);
        };
        if let Some(key) = stale_key {
            debug!("Superseding in-flight wait '{key}'");
            self.correlator.registry().force_release(&key);
        }
        info!("Switching to {target} mode");

        let guard = SwitchGuard {
            shared: &self.shared,
            registry: self.correlator.registry(),
            generation,
            armed: true,
        };
        let outcome = self.await_switch(generation, target, timeout).await;
        guard.disarm();
        outcome
    }

    async fn await_switch(
        &self,
        generation: u64,
        target: ServiceMode,
        timeout: Option<Duration>,
    ) -> Result<ServiceMode, ModeError> {
        let dispatched = self
            .correlator
            .dispatch_filtered(
                EventKind::CommandSuccess,
                EventKind::CommandError,
                CommandKind::ServiceChoice,
                Some(json!({ SERVICE_PARAM: target.as_str() })),
                move |envelope| reported_mode(envelope) == Some(target),
            )
            .await;
        let pending = match dispatched {
            Ok(pending) => pending,
            Err(e) => return Err(self.fail(generation, target, e)),
        };

        if !self.shared.track(generation, pending.key()) {
            pending.cancel();
            return Err(ModeError::superseded(target));
        }

        let outcome = match timeout {
            Some(timeout) => pending.result_within(timeout).await,
            None => pending.result().await,
        };

        match outcome {
            Ok(_) if self.shared.commit(generation, target) => {
                info!("Now in {target} mode");
                Ok(target)
            }
            Ok(_) => Err(ModeError::superseded(target)),
            Err(e) => Err(self.fail(generation, target, e)),
        }
    }

    fn fail(&self, generation: u64, target: ServiceMode, error: CommandError) -> ModeError {
        if !self.shared.revert(generation) {
            return ModeError::superseded(target);
        }

        self.diagnostics.report(Diagnostic::ModeSwitchFailed {
            target,
            reason: error.user_message(),
        });
        match error {
            CommandError::Timeout { timeout, .. } => ModeError::timeout(target, timeout),
            other => ModeError::switch(target, other),
        }
    }

    /// Abandon the in-flight switch and show the last stable mode again.
    /// Returns false when nothing was pending.
    pub fn cancel(&self) -> bool {
        let stale_key = {
            let mut inner = self.shared.inner.lock();
            if !matches!(inner.state.active_service, ActiveService::Pending(Some(_))) {
                return false;
            }
            inner.generation += 1;
            Shared::revert_locked(&mut inner);
            self.shared.tx.send_replace(inner.state);
            inner.wait_key.take()
        };

        if let Some(key) = stale_key {
            self.correlator.registry().force_release(&key);
        }
        true
    }

    /// Show `mode` before anything has been confirmed.
    ///
    /// Only applies while the mode is still unknown; any later snapshot
    /// overrides it.
    pub fn assume_mode(&self, mode: ServiceMode) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state.active_service != ActiveService::Pending(None) {
            return false;
        }
        inner.state.active_service = mode.into();
        self.shared.tx.send_replace(inner.state);
        true
    }

    /// Adopt the mode `snapshot` proves. Returns it, or `None` when the
    /// snapshot is inconclusive and the state was left alone.
    pub fn apply_snapshot(&self, snapshot: &StatusSnapshot) -> Option<ServiceMode> {
        let mode = snapshot.active_mode()?;
        self.shared.observe(self.correlator.registry(), mode);
        info!("Status snapshot reports {mode} mode");
        Some(mode)
    }

    /// Ask the daemon for its status and apply the answer.
    pub async fn refresh_status(&self) -> Result<StatusSnapshot, ModeError> {
        let pending = self
            .correlator
            .dispatch(
                EventKind::CommandSuccess,
                EventKind::CommandError,
                CommandKind::Status,
                None,
            )
            .await
            .map_err(|e| ModeError::status(e.user_message()))?;
        let envelope = pending
            .result()
            .await
            .map_err(|e| ModeError::status(e.user_message()))?;
        self.apply_status(&envelope)
    }

    /// [`ModeCoordinator::refresh_status`] bounded by `timeout`.
    pub async fn refresh_status_within(
        &self,
        timeout: Duration,
    ) -> Result<StatusSnapshot, ModeError> {
        let envelope = self
            .correlator
            .dispatch(
                EventKind::CommandSuccess,
                EventKind::CommandError,
                CommandKind::Status,
                None,
            )
            .await
            .map_err(|e| ModeError::status(e.user_message()))?
            .result_within(timeout)
            .await
            .map_err(|e| ModeError::status(e.user_message()))?;
        self.apply_status(&envelope)
    }

    fn apply_status(&self, envelope: &Envelope) -> Result<StatusSnapshot, ModeError> {
        let snapshot = match envelope.result() {
            Some(result) => StatusSnapshot::from_value(result)?,
            None => StatusSnapshot::default(),
        };
        self.apply_snapshot(&snapshot);
        Ok(snapshot)
    }

    /// Treat `service_started` notifications as observed truth.
    ///
    /// Idempotent: returns false if already attached.
    pub fn attach(&self) -> bool {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let registry = self.correlator.registry().downgrade();
        let handler: EventHandler = Arc::new(move |envelope: &Envelope| {
            let Some(mode) = envelope
                .payload
                .as_ref()
                .and_then(|payload| payload.get(SERVICE_NAME_FIELD))
                .and_then(Value::as_str)
                .and_then(|name| name.parse::<ServiceMode>().ok())
            else {
                return;
            };
            if let (Some(shared), Some(registry)) = (weak.upgrade(), registry.upgrade()) {
                info!("Daemon reports {mode} service started");
                shared.observe(&registry, mode);
            }
        });

        let unsubscribe = self
            .correlator
            .transport()
            .subscribe(EventKind::ServiceStarted.encode(), handler);
        self.correlator
            .registry()
            .add_once(SERVICE_STARTED_KEY, unsubscribe)
    }

    pub fn detach(&self) -> bool {
        self.correlator.registry().force_release(SERVICE_STARTED_KEY)
    }
}
