//! Errors surfaced by the command/event correlator.
//!
//! Callers must be able to tell "never reached the service" apart from
//! "service reported an error", so the two live in separate variants:
//! - [`CommandError::Dispatch`]: the transport rejected the send
//! - [`CommandError::Service`]: a correlated error envelope arrived

use crate::event::CommandKind;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("Dispatch Error: {command}: {message} {location}")]
    Dispatch {
        command: CommandKind,
        message: String,
        location: ErrorLocation,
    },

    #[error("Service Error: {command}: {message} {location}")]
    Service {
        command: CommandKind,
        message: String,
        location: ErrorLocation,
    },

    #[error("Cancelled Error: {command} wait was released before a result arrived {location}")]
    Cancelled {
        command: CommandKind,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {command} got no result within {timeout:?} {location}")]
    Timeout {
        command: CommandKind,
        timeout: Duration,
        location: ErrorLocation,
    },
}

impl CommandError {
    #[track_caller]
    pub fn dispatch(command: CommandKind, message: impl Into<String>) -> Self {
        CommandError::Dispatch {
            command,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn service(command: CommandKind, message: impl Into<String>) -> Self {
        CommandError::Service {
            command,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn cancelled(command: CommandKind) -> Self {
        CommandError::Cancelled {
            command,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(command: CommandKind, timeout: Duration) -> Self {
        CommandError::Timeout {
            command,
            timeout,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The command never reached the service.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, CommandError::Dispatch { .. })
    }

    /// The service received the command and reported a failure.
    pub fn is_service_reported(&self) -> bool {
        matches!(self, CommandError::Service { .. })
    }

    pub fn command(&self) -> CommandKind {
        match self {
            CommandError::Dispatch { command, .. }
            | CommandError::Service { command, .. }
            | CommandError::Cancelled { command, .. }
            | CommandError::Timeout { command, .. } => *command,
        }
    }

    /// Message suitable for a user-facing notification (no location suffix).
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Dispatch { message, .. } => {
                format!("Could not reach the service: {message}")
            }
            CommandError::Service { message, .. } => message.clone(),
            CommandError::Cancelled { .. } => "Request was cancelled".to_string(),
            CommandError::Timeout { timeout, .. } => {
                format!("The service did not answer within {timeout:?}")
            }
        }
    }
}
