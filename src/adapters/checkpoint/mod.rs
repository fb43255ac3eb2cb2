//! File-based checkpoint persistence.

pub mod json_file;

pub use json_file::JsonFileCheckpointStore;
