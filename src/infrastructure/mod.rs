//! Infrastructure: configuration, logging and filesystem helpers.

pub mod config;
pub mod fs;
pub mod logging;
