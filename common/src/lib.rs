//! Shared primitives for the bridge workspace.
//!
//! Every error type in `bridge-core` and `bridge-console` records where it was
//! raised through [`ErrorLocation`], so log lines point at the failing call
//! site rather than at the error constructor.

pub mod error;

pub use error::error_location::ErrorLocation;
