//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Tagged results carry a `__typename` discriminator.

pub mod auth;
pub mod ballot;
pub mod id;
pub mod meeting;
pub mod votation;
