//! Roster of clients known to the server, merged from partial observations.
//!
//! The daemon learns a client's identity in pieces: an address first, a uid
//! once the client has been issued one. Observations are folded into a
//! single record per client using the precedence in [`matcher`], and a
//! record keeps the identity key it was created with for its whole life.

mod feed;
pub mod matcher;

pub use feed::RosterFeed;

use crate::error::RosterError;

use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub identity_key: String,
    pub uid: Option<String>,
    pub hostname: String,
    pub address: String,
    pub online: bool,
    pub last_seen_at: Option<SystemTime>,
    pub screen_position: Option<String>,
}

/// One sighting of a client. Blank fields are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub uid: Option<String>,
    pub hostname: Option<String>,
    pub address: Option<String>,
    pub screen_position: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = non_blank(Some(uid));
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = non_blank(Some(hostname));
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = non_blank(Some(address));
        self
    }

    pub fn with_screen_position(mut self, position: &str) -> Self {
        self.screen_position = non_blank(Some(position));
        self
    }

    /// Read a client object as the daemon sends it.
    pub fn from_payload(payload: &Value) -> Self {
        let field = |names: &[&str]| {
            non_blank(
                names
                    .iter()
                    .find_map(|name| payload.get(*name).and_then(Value::as_str)),
            )
        };
        Self {
            uid: field(&["uid"]),
            hostname: field(&["host_name", "hostname"]),
            address: field(&["ip_address", "address"]),
            screen_position: field(&["screen_position"]),
        }
    }

    pub fn is_identifiable(&self) -> bool {
        self.uid.is_some() || self.address.is_some() || self.hostname.is_some()
    }
}

/// Records live in insertion order in a flat arena.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    records: Vec<ClientRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ClientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identity_key: &str) -> Option<&ClientRecord> {
        self.records
            .iter()
            .find(|record| record.identity_key == identity_key)
    }

    /// Fold `observation` into the roster, stamped with the current time.
    pub fn reconcile(
        &mut self,
        observation: &Observation,
        online: bool,
    ) -> Result<&[ClientRecord], RosterError> {
        self.reconcile_at(observation, online, SystemTime::now())
    }

    pub fn reconcile_at(
        &mut self,
        observation: &Observation,
        online: bool,
        seen_at: SystemTime,
    ) -> Result<&[ClientRecord], RosterError> {
        match matcher::find(&self.records, observation) {
            Some(index) => {
                let record = &mut self.records[index];
                if record.uid.is_none() {
                    record.uid = observation.uid.clone();
                }
                if let Some(hostname) = &observation.hostname {
                    record.hostname = hostname.clone();
                }
                if let Some(address) = &observation.address {
                    record.address = address.clone();
                }
                if observation.screen_position.is_some() {
                    record.screen_position = observation.screen_position.clone();
                }
                record.online = online;
                record.last_seen_at = Some(seen_at);
            }
            None => {
                let identity_key =
                    matcher::synthesize_key(observation).ok_or_else(|| RosterError::unidentifiable())?;
                self.records.push(ClientRecord {
                    identity_key,
                    uid: observation.uid.clone(),
                    hostname: observation.hostname.clone().unwrap_or_default(),
                    address: observation.address.clone().unwrap_or_default(),
                    online,
                    last_seen_at: Some(seen_at),
                    screen_position: observation.screen_position.clone(),
                });
            }
        }
        Ok(&self.records)
    }

    pub fn remove(&mut self, identity_key: &str) -> Result<ClientRecord, RosterError> {
        let index = self
            .records
            .iter()
            .position(|record| record.identity_key == identity_key)
            .ok_or_else(|| RosterError::unknown_client(identity_key))?;
        Ok(self.records.remove(index))
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}
