use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Traffic that reached the bridge but cannot be turned into an envelope.
///
/// Never propagated into caller code; the link reports these through
/// [`Diagnostics`](crate::diagnostics::Diagnostics) and keeps reading.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("Unknown Event Error: '{name}' {location}")]
    UnknownEvent {
        name: String,
        location: ErrorLocation,
    },

    #[error("Malformed Result Error: {kind}: {reason} {location}")]
    MalformedResult {
        kind: &'static str,
        reason: String,
        location: ErrorLocation,
    },

    #[error("Json Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },
}

impl ProtocolError {
    #[track_caller]
    pub fn unknown_event(name: impl Into<String>) -> Self {
        ProtocolError::UnknownEvent {
            name: name.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn malformed_result(kind: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedResult {
            kind,
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ProtocolError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
