//! Embedded schema migrations for the checkpoint database.

use sqlx::SqlitePool;
use thiserror::Error;

/// Errors raised while migrating the schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration's SQL failed.
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        /// Migration that failed.
        version: i64,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },
    /// The applied version could not be read.
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

/// One embedded schema migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Monotonic version number.
    pub version: i64,
    /// Short label logged when applied.
    pub description: &'static str,
    /// Statements run in one transaction.
    pub sql: &'static str,
}

/// Applies embedded migrations and records them in `schema_migrations`.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    /// Wrap a pool that schema migrations will run against.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration newer than the recorded version. Returns how
    /// many were applied.
    pub async fn run(&self, migrations: &[Migration]) -> Result<usize, MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;

        let current = self.current_version().await?;
        let mut applied = 0;
        for migration in migrations.iter().filter(|m| m.version > current) {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;
            sqlx::raw_sql(migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.description)
                .execute(&mut *tx)
                .await
                .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;
            tx.commit()
                .await
                .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;

            tracing::debug!(version = migration.version, description = migration.description, "Applied migration");
            applied += 1;
        }
        Ok(applied)
    }

    /// Highest applied version, 0 for a fresh database.
    pub async fn current_version(&self) -> Result<i64, MigrationError> {
        let (version,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(version)
    }
}

/// Migrations compiled into the binary, oldest first.
pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Run checkpoints",
        sql: include_str!("../../../migrations/001_run_checkpoints.sql"),
    }]
}
