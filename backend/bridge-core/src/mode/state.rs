use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// One of the two mutually exclusive daemon services.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ServiceMode {
    Client,
    Server,
}

impl ServiceMode {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn other(self) -> Self {
        match self {
            ServiceMode::Client => ServiceMode::Server,
            ServiceMode::Server => ServiceMode::Client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveService {
    Client,
    Server,
    /// Waiting for confirmation of the given target; `None` until the first
    /// status snapshot says which service is running.
    Pending(Option<ServiceMode>),
}

impl ActiveService {
    pub fn stable(self) -> Option<ServiceMode> {
        match self {
            ActiveService::Client => Some(ServiceMode::Client),
            ActiveService::Server => Some(ServiceMode::Server),
            ActiveService::Pending(_) => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, ActiveService::Pending(_))
    }
}

impl From<ServiceMode> for ActiveService {
    fn from(mode: ServiceMode) -> Self {
        match mode {
            ServiceMode::Client => ActiveService::Client,
            ServiceMode::Server => ActiveService::Server,
        }
    }
}

/// What the UI shows.
///
/// While a switch is pending, `previous_service` is the stable mode the
/// switch reverts to if it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub active_service: ActiveService,
    pub previous_service: Option<ServiceMode>,
}

impl ModeState {
    pub fn stable(&self) -> Option<ServiceMode> {
        self.active_service.stable()
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self {
            active_service: ActiveService::Pending(None),
            previous_service: None,
        }
    }
}
