//! The daemon's answer to the `status` command.

use crate::error::ModeError;
use crate::mode::ServiceMode;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub start_time: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default, alias = "otp_nededed")]
    pub otp_needed: bool,
    #[serde(default)]
    pub service_choice_needed: bool,
    #[serde(default)]
    pub available_servers: Vec<Value>,
    #[serde(default)]
    pub start_time: Option<Value>,
}

/// Only the parts of the status result the mode machine reads. A service
/// section is present only when that service is configured.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

impl StatusSnapshot {
    pub fn from_value(value: &Value) -> Result<Self, ModeError> {
        StatusSnapshot::deserialize(value)
            .map_err(|e| ModeError::status(format!("Malformed status result: {e}")))
    }

    /// The mode this snapshot proves, if any.
    ///
    /// A running service wins over a merely configured one. When both
    /// services are configured and neither runs, nothing is proven.
    pub fn active_mode(&self) -> Option<ServiceMode> {
        let server_running = self.server_info.as_ref().is_some_and(|info| info.running);
        let client_running = self.client_info.as_ref().is_some_and(|info| info.running);

        match (server_running, client_running) {
            (true, _) => Some(ServiceMode::Server),
            (false, true) => Some(ServiceMode::Client),
            (false, false) => match (&self.server_info, &self.client_info) {
                (Some(_), None) => Some(ServiceMode::Server),
                (None, Some(_)) => Some(ServiceMode::Client),
                _ => None,
            },
        }
    }
}
