//! Data types, in the shapes they take on the wire and in the database.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
