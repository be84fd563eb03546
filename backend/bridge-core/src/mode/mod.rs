//! Client/server exclusive-mode state machine.

mod coordinator;
mod snapshot;
mod state;

pub use coordinator::ModeCoordinator;
pub use snapshot::{ClientInfo, ServerInfo, StatusSnapshot};
pub use state::{ActiveService, ModeState, ServiceMode};
