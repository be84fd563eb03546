pub mod command;
pub mod config;
pub mod mode;
pub mod protocol;
pub mod roster;
pub mod transport;

pub use command::CommandError;
pub use config::ConfigError;
pub use mode::ModeError;
pub use protocol::ProtocolError;
pub use roster::RosterError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
