//! One connected run of the console: link, registry, mode and roster.

use crate::error::ConsoleError;

use bridge_core::config::BridgeConfig;
use bridge_core::{
    ActiveService, ClientRecord, Correlator, DaemonLink, Diagnostic, Diagnostics,
    ModeCoordinator, ModeState, RosterFeed, ServiceMode, StatusSnapshot, SubscriptionRegistry,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Human/JSON rendering of a status snapshot after it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub mode: Option<ServiceMode>,
    pub pending: bool,
    pub server_running: bool,
    pub client_running: bool,
    pub client_connected: bool,
    pub otp_needed: bool,
    pub service_choice_needed: bool,
    pub available_servers: usize,
}

impl StatusReport {
    pub fn new(snapshot: &StatusSnapshot, state: ModeState) -> Self {
        let client = snapshot.client_info.clone().unwrap_or_default();
        Self {
            mode: state.stable(),
            pending: state.active_service.is_pending(),
            server_running: snapshot.server_info.as_ref().is_some_and(|info| info.running),
            client_running: client.running,
            client_connected: client.connected,
            otp_needed: client.otp_needed,
            service_choice_needed: client.service_choice_needed,
            available_servers: client.available_servers.len(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Some(mode) => writeln!(f, "mode:    {mode}")?,
            None => writeln!(f, "mode:    unknown")?,
        }
        writeln!(f, "server:  {}", running(self.server_running))?;
        write!(
            f,
            "client:  {}{}",
            running(self.client_running),
            if self.client_connected { ", connected" } else { "" }
        )?;
        if self.otp_needed {
            write!(f, "\nwaiting for OTP")?;
        }
        if self.service_choice_needed {
            write!(
                f,
                "\nserver choice needed ({} found)",
                self.available_servers
            )?;
        }
        Ok(())
    }
}

fn running(flag: bool) -> &'static str {
    if flag { "running" } else { "stopped" }
}

pub fn describe_mode(state: &ModeState) -> String {
    match state.active_service {
        ActiveService::Client => "client".to_string(),
        ActiveService::Server => "server".to_string(),
        ActiveService::Pending(Some(target)) => format!("switching to {target}"),
        ActiveService::Pending(None) => "unknown".to_string(),
    }
}

fn describe_client(record: &ClientRecord) -> String {
    let name = if record.hostname.is_empty() {
        &record.identity_key
    } else {
        &record.hostname
    };
    let state = if record.online { "online" } else { "offline" };
    match record.address.as_str() {
        "" => format!("{name} {state}"),
        address => format!("{name} ({address}) {state}"),
    }
}

pub struct Session {
    config: BridgeConfig,
    link: Arc<DaemonLink>,
    registry: SubscriptionRegistry,
    coordinator: ModeCoordinator<DaemonLink>,
    roster: RosterFeed<DaemonLink>,
    diagnostics: Diagnostics,
}

impl Session {
    /// Connect to the daemon and wire up the mode machine.
    pub async fn open(config: BridgeConfig) -> Result<Self, ConsoleError> {
        let diagnostics = Diagnostics::new();
        let link = Arc::new(DaemonLink::connect(&config.link, diagnostics.clone()).await?);
        let registry = SubscriptionRegistry::new(diagnostics.clone());
        let coordinator = ModeCoordinator::new(Correlator::new(Arc::clone(&link), registry.clone()));

        if let Some(mode) = config.preferred_mode {
            coordinator.assume_mode(mode);
        }
        coordinator.attach();
        let roster = RosterFeed::new(Arc::clone(&link), registry.clone());

        Ok(Self {
            config,
            link,
            registry,
            coordinator,
            roster,
            diagnostics,
        })
    }

    fn timeout(&self) -> Duration {
        self.config.commands.timeout()
    }

    pub async fn status(&self) -> Result<StatusReport, ConsoleError> {
        let snapshot = self.coordinator.refresh_status_within(self.timeout()).await?;
        Ok(StatusReport::new(&snapshot, self.coordinator.state()))
    }

    /// Reconcile with the daemon, then switch if needed.
    pub async fn switch(&self, target: ServiceMode) -> Result<ServiceMode, ConsoleError> {
        if let Err(e) = self.coordinator.refresh_status_within(self.timeout()).await {
            warn!("Could not read daemon status before switching: {e}");
        }
        Ok(self
            .coordinator
            .request_mode_within(target, self.timeout())
            .await?)
    }

    /// Print mode changes, client sightings and diagnostics until Ctrl-C or
    /// until the daemon hangs up.
    pub async fn watch(&self, json_output: bool) -> Result<(), ConsoleError> {
        let mut modes = self.coordinator.subscribe();
        let mut reports = self.diagnostics.subscribe();
        let mut poll = tokio::time::interval(LINK_POLL_INTERVAL);
        let mut last_roster: Vec<ClientRecord> = Vec::new();

        self.roster.attach();
        if let Err(e) = self.coordinator.refresh_status_within(self.timeout()).await {
            warn!("Initial status refresh failed: {e}");
        }
        emit(json_output, "mode", &describe_mode(&self.coordinator.state()));
        info!("Watching daemon notifications");

        let outcome = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break Ok(()),
                changed = modes.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                    let state = *modes.borrow_and_update();
                    emit(json_output, "mode", &describe_mode(&state));
                }
                report = reports.recv() => match report {
                    Ok(diagnostic) => emit(json_output, "diagnostic", &describe_diagnostic(&diagnostic)),
                    Err(RecvError::Lagged(skipped)) => debug!("Skipped {skipped} diagnostics"),
                    Err(RecvError::Closed) => break Ok(()),
                },
                _ = poll.tick() => {
                    let records = self.roster.records();
                    for record in records.iter().filter(|record| !last_roster.contains(record)) {
                        emit(json_output, "client", &describe_client(record));
                    }
                    last_roster = records;
                    if self.link.is_closed() {
                        break Err(ConsoleError::Link {
                            message: "Daemon closed the connection".to_string(),
                            location: common::ErrorLocation::caller(),
                        });
                    }
                }
            }
        };

        self.roster.detach();
        outcome
    }

    pub fn mode(&self) -> ModeState {
        self.coordinator.state()
    }

    /// Drop every subscription and stop the link.
    pub fn close(&self) {
        let released = self.registry.release_all();
        debug!("Released {released} subscriptions");
        self.link.shutdown();
    }
}

fn describe_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::UnknownSubscriptionKey { key } => format!("unknown subscription '{key}'"),
        Diagnostic::UndecodableEvent { reason } => format!("undecodable event: {reason}"),
        Diagnostic::UnidentifiableClient => "client without identity ignored".to_string(),
        Diagnostic::ModeSwitchFailed { target, reason } => {
            format!("switch to {target} failed: {reason}")
        }
    }
}

fn emit(json_output: bool, kind: &str, text: &str) {
    if json_output {
        println!("{}", json!({ "kind": kind, "text": text }));
    } else {
        println!("{kind:<10} {text}");
    }
}
