//! Ordered identity matchers.
//!
//! An observation is matched against the roster one matcher at a time, in
//! the order of [`MATCHERS`]; the first matcher that finds any record wins.
//! Keys for new records are synthesized with the same precedence.

use crate::roster::{ClientRecord, Observation};

pub type Matcher = fn(&ClientRecord, &Observation) -> bool;

pub const MATCHERS: [(&str, Matcher); 3] = [
    ("uid", by_uid),
    ("address", by_address),
    ("hostname", by_hostname),
];

pub fn by_uid(record: &ClientRecord, observation: &Observation) -> bool {
    matches!((&record.uid, &observation.uid), (Some(known), Some(seen)) if known == seen)
}

pub fn by_address(record: &ClientRecord, observation: &Observation) -> bool {
    uid_compatible(record, observation)
        && observation
            .address
            .as_deref()
            .is_some_and(|address| record.address == address)
}

pub fn by_hostname(record: &ClientRecord, observation: &Observation) -> bool {
    uid_compatible(record, observation)
        && observation
            .hostname
            .as_deref()
            .is_some_and(|hostname| record.hostname == hostname)
}

/// A record already bound to a different uid belongs to another client.
fn uid_compatible(record: &ClientRecord, observation: &Observation) -> bool {
    match (&record.uid, &observation.uid) {
        (Some(known), Some(seen)) => known == seen,
        _ => true,
    }
}

/// Index of the record `observation` belongs to.
pub fn find(records: &[ClientRecord], observation: &Observation) -> Option<usize> {
    MATCHERS.iter().find_map(|(_, matcher)| {
        records
            .iter()
            .position(|record| matcher(record, observation))
    })
}

/// Identity key for a client seen for the first time.
pub fn synthesize_key(observation: &Observation) -> Option<String> {
    if let Some(uid) = &observation.uid {
        return Some(uid.clone());
    }
    if let Some(address) = &observation.address {
        return Some(format!("address:{address}"));
    }
    observation
        .hostname
        .as_ref()
        .map(|hostname| format!("hostname:{hostname}"))
}
