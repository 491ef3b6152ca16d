//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Fields are camelCase.

pub mod access;
pub mod ballot;
pub mod id;
pub mod integrity;
pub mod tally;
