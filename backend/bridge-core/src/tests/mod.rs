mod config;
mod envelope;
mod event_kind;
mod registry;
mod roster;
mod snapshot;
