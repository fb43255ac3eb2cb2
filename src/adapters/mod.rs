//! Adapters implementing the domain ports.

pub mod agents;
pub mod build;
pub mod checkpoint;
pub mod sqlite;
