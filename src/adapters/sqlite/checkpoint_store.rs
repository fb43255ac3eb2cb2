//! SQLite implementation of the CheckpointStore.

use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RunState;
use crate::domain::ports::{decode_run_state, CheckpointStore};

use super::connection::create_pool;
use super::migrations::{all_embedded_migrations, Migrator};

/// Checkpoints as JSON documents in a `run_checkpoints` table.
///
/// Each save is a single upsert statement, so SQLite's transaction
/// guarantees make it atomic. `updated_seq` is a store-wide counter that
/// orders runs for [`latest`](CheckpointStore::latest) independently of
/// wall-clock time.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `path`, creating and migrating it if needed.
    pub async fn open(path: &Path) -> DomainResult<Self> {
        let pool = create_pool(path)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        Self::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Apply any pending schema migrations to `pool`.
    pub async fn migrate(pool: &SqlitePool) -> DomainResult<()> {
        Migrator::new(pool.clone())
            .run(&all_embedded_migrations())
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, state: &RunState) -> DomainResult<()> {
        let state_json = serde_json::to_string(state)?;

        sqlx::query(
            r#"INSERT INTO run_checkpoints (
                run_id, schema_version, status, state_json, updated_seq, updated_at
            ) VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(updated_seq), 0) + 1 FROM run_checkpoints), ?)
            ON CONFLICT(run_id) DO UPDATE SET
                schema_version = excluded.schema_version,
                status = excluded.status,
                state_json = excluded.state_json,
                updated_seq = excluded.updated_seq,
                updated_at = excluded.updated_at"#,
        )
        .bind(&state.run_id)
        .bind(i64::from(state.schema_version))
        .bind(state.status.label())
        .bind(&state_json)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, run_id: &str) -> DomainResult<RunState> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state_json FROM run_checkpoints WHERE run_id = ?")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => decode_run_state(&json),
            None => Err(DomainError::RunNotFound(run_id.to_string())),
        }
    }

    async fn latest(&self) -> DomainResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT run_id FROM run_checkpoints ORDER BY updated_seq DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn list(&self) -> DomainResult<Vec<RunState>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT state_json FROM run_checkpoints ORDER BY updated_seq DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(|(json,)| decode_run_state(json)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_test_pool;
    use crate::domain::models::RunStatus;

    async fn store() -> SqliteCheckpointStore {
        let pool = create_test_pool().await.unwrap();
        SqliteCheckpointStore::migrate(&pool).await.unwrap();
        SqliteCheckpointStore::new(pool)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = store().await;
        let mut state = RunState::with_id("run-a", 5);
        state.set_status(RunStatus::Stalled);

        store.save(&state).await.unwrap();
        assert_eq!(store.load("run-a").await.unwrap(), state);
    }

    #[tokio::test]
    async fn latest_follows_save_order_not_ids() {
        let store = store().await;
        store.save(&RunState::with_id("zzz", 1)).await.unwrap();
        store.save(&RunState::with_id("aaa", 1)).await.unwrap();
        assert_eq!(store.latest().await.unwrap().as_deref(), Some("aaa"));

        store.save(&RunState::with_id("zzz", 1)).await.unwrap();
        assert_eq!(store.latest().await.unwrap().as_deref(), Some("zzz"));
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let store = store().await;
        assert!(store.latest().await.unwrap().is_none());
        assert!(matches!(
            store.load("nope").await,
            Err(DomainError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_test_pool().await.unwrap();
        SqliteCheckpointStore::migrate(&pool).await.unwrap();
        SqliteCheckpointStore::migrate(&pool).await.unwrap();
    }
}
