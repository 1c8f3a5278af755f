//! Types shared between the API and the database representations.

pub mod ballot;
pub mod meeting;
pub mod votation;

/// Users are identified by their identity provider subject.
pub type UserId = String;
