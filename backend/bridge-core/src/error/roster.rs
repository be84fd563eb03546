use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RosterError {
    #[error("Unidentifiable Client Error: observation has no uid, address or hostname {location}")]
    Unidentifiable { location: ErrorLocation },

    #[error("Unknown Client Error: '{identity_key}' {location}")]
    UnknownClient {
        identity_key: String,
        location: ErrorLocation,
    },
}

impl RosterError {
    #[track_caller]
    pub fn unidentifiable() -> Self {
        RosterError::Unidentifiable {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_client(identity_key: impl Into<String>) -> Self {
        RosterError::UnknownClient {
            identity_key: identity_key.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
