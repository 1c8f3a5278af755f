//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod alternative;
pub mod ballot;
pub mod meeting;
pub mod participant;
pub mod votation;
