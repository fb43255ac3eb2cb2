//! Domain layer for the buildfix orchestrator
//!
//! This module contains the error taxonomy, the data model of a convergence
//! run, and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
