//! JSON file implementation of the CheckpointStore.
//!
//! Layout under the store directory:
//!
//! ```text
//! <run_id>.json   pretty-printed RunState, one per run
//! LATEST          id of the most recently saved run
//! ```
//!
//! Both files are replaced with write-to-temp, fsync, rename, so a crash
//! mid-save leaves the previous version intact.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RunState;
use crate::domain::ports::{decode_run_state, CheckpointStore};
use crate::infrastructure::fs::write_atomic;

const LATEST_FILE: &str = "LATEST";

/// Checkpoints as one JSON document per run in a directory.
/// | A `LATEST` file names the most recently saved run. Every file is
/// replaced atomically.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    dir: PathBuf,
}

impl JsonFileCheckpointStore {
    /// A store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the run documents live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a run's document. Ids that could escape the directory are
    /// rejected.
    fn run_path(&self, run_id: &str) -> Option<PathBuf> {
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !run_id.starts_with('.');
        valid.then(|| self.dir.join(format!("{run_id}.json")))
    }

    async fn write(&self, path: PathBuf, contents: String) -> io::Result<()> {
        tokio::task::spawn_blocking(move || write_atomic(&path, contents.as_bytes()))
            .await
            .map_err(io::Error::other)?
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn save(&self, state: &RunState) -> DomainResult<()> {
        let write_error = |reason: String| DomainError::CheckpointWrite {
            run_id: state.run_id.clone(),
            reason,
        };

        let path = self
            .run_path(&state.run_id)
            .ok_or_else(|| write_error("run id is not a valid file name".to_string()))?;
        let json = serde_json::to_string_pretty(state).map_err(|e| write_error(e.to_string()))?;

        self.write(path, json)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        self.write(self.dir.join(LATEST_FILE), format!("{}\n", state.run_id))
            .await
            .map_err(|e| write_error(e.to_string()))?;

        tracing::debug!(
            run_id = %state.run_id,
            iteration = state.current_iteration,
            status = state.status.label(),
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self, run_id: &str) -> DomainResult<RunState> {
        let path = self
            .run_path(run_id)
            .ok_or_else(|| DomainError::RunNotFound(run_id.to_string()))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(json) => decode_run_state(&json),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DomainError::RunNotFound(run_id.to_string()))
            }
            Err(e) => Err(DomainError::io(path, e)),
        }
    }

    async fn latest(&self) -> DomainResult<Option<String>> {
        let path = self.dir.join(LATEST_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::io(path, e)),
        }
    }

    async fn list(&self) -> DomainResult<Vec<RunState>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DomainError::io(&self.dir, e)),
        };

        let mut runs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let json = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| DomainError::io(&path, e))?;
            match decode_run_state(&json) {
                Ok(state) => runs.push(state),
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable checkpoint");
                }
            }
        }

        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FailureKind, RunStatus};

    #[tokio::test]
    async fn save_load_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path().join("runs"));

        assert!(store.latest().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());

        let mut first = RunState::with_id("first", 3);
        first.set_status(RunStatus::Failed {
            kind: FailureKind::Interrupted,
            detail: "ctrl-c".into(),
        });
        store.save(&first).await.unwrap();
        store.save(&RunState::with_id("second", 3)).await.unwrap();

        assert_eq!(store.latest().await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.load("first").await.unwrap(), first);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn document_is_human_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path());
        store.save(&RunState::with_id("r1", 2)).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("r1.json")).unwrap();
        assert!(text.contains("\"schema_version\": 1"));
        assert!(text.contains("\"state\": \"running\""));
    }

    #[tokio::test]
    async fn rejects_path_like_run_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path());

        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(DomainError::RunNotFound(_))
        ));
        assert!(matches!(
            store.save(&RunState::with_id("a/b", 1)).await,
            Err(DomainError::CheckpointWrite { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path());
        assert!(matches!(
            store.load("missing").await,
            Err(DomainError::RunNotFound(_))
        ));
    }
}
