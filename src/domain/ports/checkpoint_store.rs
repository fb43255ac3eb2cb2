//! Checkpoint store port for durable run state.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunState, RUN_STATE_SCHEMA_VERSION};

/// Repository interface for [`RunState`] persistence.
///
/// `save` is the unit of durability: once it returns `Ok`, a fresh process
/// must be able to `load` exactly that state, and a crash during `save` must
/// leave the previous state readable.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist or replace the state of `state.run_id` and mark it the most
    /// recent run.
    async fn save(&self, state: &RunState) -> DomainResult<()>;

    /// Load a run by id. Fails with [`DomainError::RunNotFound`] if absent.
    async fn load(&self, run_id: &str) -> DomainResult<RunState>;

    /// Id of the most recently saved run.
    async fn latest(&self) -> DomainResult<Option<String>>;

    /// All stored runs, most recently updated first.
    async fn list(&self) -> DomainResult<Vec<RunState>>;
}

/// Decode a persisted checkpoint, refusing schema versions this binary does
/// not understand.
pub fn decode_run_state(json: &str) -> DomainResult<RunState> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DomainError::CheckpointRead(format!("invalid JSON: {e}")))?;

    let found = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| DomainError::CheckpointRead("missing schema_version".to_string()))?;
    let found = u32::try_from(found).unwrap_or(u32::MAX);
    if found > RUN_STATE_SCHEMA_VERSION {
        return Err(DomainError::UnsupportedCheckpointVersion {
            found,
            supported: RUN_STATE_SCHEMA_VERSION,
        });
    }

    serde_json::from_value(value).map_err(|e| DomainError::CheckpointRead(e.to_string()))
}
