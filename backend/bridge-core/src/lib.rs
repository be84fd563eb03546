pub mod config;
pub mod correlator;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod mode;
pub mod registry;
pub mod roster;
pub mod transport;

#[cfg(test)]
mod tests;

pub use correlator::{Correlator, PendingCommand};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use event::{CommandKind, Envelope, EventKind, WireName};
pub use mode::{ActiveService, ModeCoordinator, ModeState, ServiceMode, StatusSnapshot};
pub use registry::SubscriptionRegistry;
pub use roster::{ClientRecord, Observation, Roster, RosterFeed};
pub use transport::{DaemonLink, EventBus, Transport};

pub const DAEMON_APP_DIR: &str = "perpetua";
pub const DAEMON_HOST: &str = "127.0.0.1";
pub const DAEMON_PORT: u16 = 55652;
