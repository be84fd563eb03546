use crate::error::CommandError;
use crate::mode::ServiceMode;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ModeError {
    #[error("Mode Switch Error: switch to {target} failed: {source} {location}")]
    Switch {
        target: ServiceMode,
        #[source]
        source: CommandError,
        location: ErrorLocation,
    },

    #[error("Superseded Error: switch to {target} was replaced by a newer request {location}")]
    Superseded {
        target: ServiceMode,
        location: ErrorLocation,
    },

    #[error("Timeout Error: switch to {target} not confirmed within {timeout:?} {location}")]
    Timeout {
        target: ServiceMode,
        timeout: Duration,
        location: ErrorLocation,
    },

    #[error("Status Error: {message} {location}")]
    Status {
        message: String,
        location: ErrorLocation,
    },
}

impl ModeError {
    #[track_caller]
    pub fn switch(target: ServiceMode, source: CommandError) -> Self {
        ModeError::Switch {
            target,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn superseded(target: ServiceMode) -> Self {
        ModeError::Superseded {
            target,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(target: ServiceMode, timeout: Duration) -> Self {
        ModeError::Timeout {
            target,
            timeout,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn status(message: impl Into<String>) -> Self {
        ModeError::Status {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True when the switch never reached the service.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, ModeError::Switch { source, .. } if source.is_dispatch())
    }
}
