use bridge_core::error::{ConfigError, ModeError, TransportError};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the console front-end.
///
/// Core errors are flattened to their message so they can be printed as
/// JSON with `--json`; the location is where the console observed them.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ConsoleError {
    /// Error from this app (logger, directories)
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },

    /// Config file could not be loaded or is invalid
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Daemon could not be reached
    #[error("Link Error: {message} {location}")]
    Link {
        message: String,
        location: ErrorLocation,
    },

    /// Daemon refused or did not answer a request
    #[error("Request Error: {message} {location}")]
    Request {
        message: String,
        location: ErrorLocation,
    },
}

impl ConsoleError {
    #[track_caller]
    pub fn console(message: impl Into<String>) -> Self {
        ConsoleError::Console {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for ConsoleError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ConsoleError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for ConsoleError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        ConsoleError::Link {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ModeError> for ConsoleError {
    #[track_caller]
    fn from(error: ModeError) -> Self {
        ConsoleError::Request {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
