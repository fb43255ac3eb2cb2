//! Port trait definitions (Hexagonal Architecture)
//!
//! The loop talks to the outside world only through these traits:
//! - BuildTool: the external compiler invocation
//! - FixAgent: pluggable per-category repair routines
//! - CheckpointStore: durable run state
//!
//! Adapters under `crate::adapters` provide the concrete implementations.

pub mod build_tool;
pub mod checkpoint_store;
pub mod fix_agent;

pub use build_tool::{BuildOutput, BuildTool};
pub use checkpoint_store::{decode_run_state, CheckpointStore};
pub use fix_agent::{errors_by_file, resolve_in, FileGrant, FixAgent};
