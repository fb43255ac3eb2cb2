//! Domain errors for the buildfix orchestrator.
//!
//! Only [`DomainError::ToolInvocation`] and [`DomainError::CheckpointWrite`]
//! terminate a convergence run. Everything else is contained by the component
//! that raised it and surfaces as data in the iteration record.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-level errors that can occur while repairing a build.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The build command could not be run or timed out.
    #[error("Build tool invocation failed: {0}")]
    ToolInvocation(String),

    /// Build output that cannot be trusted as an error count.
    #[error("Build output is ambiguous: {0}")]
    ParseAmbiguity(String),

    /// An agent touched a file outside its grant.
    #[error("File {} was not granted to agent {agent}", path.display())]
    UngrantedFile {
        /// Agent that attempted the access.
        agent: String,
        /// Resolved path outside the grant.
        path: PathBuf,
    },

    /// An agent returned an error or panicked.
    #[error("Agent {agent} failed: {reason}")]
    AgentFailed {
        /// Agent variant name.
        agent: String,
        /// What went wrong.
        reason: String,
    },

    /// Saving run state failed. Fatal to the run.
    #[error("Failed to write checkpoint for run {run_id}: {reason}")]
    CheckpointWrite {
        /// Run whose state could not be saved.
        run_id: String,
        /// Underlying store error.
        reason: String,
    },

    /// A stored checkpoint could not be read or decoded.
    #[error("Failed to read checkpoint: {0}")]
    CheckpointRead(String),

    /// No checkpoint exists for the requested run.
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// The checkpoint was written by a newer buildfix.
    #[error("Checkpoint schema version {found} is newer than supported version {supported}")]
    UnsupportedCheckpointVersion {
        /// Version stored in the document.
        found: u32,
        /// Newest version this build reads.
        supported: u32,
    },

    /// A category rule does not compile.
    #[error("Invalid rule in category {category}: {reason}")]
    InvalidRule {
        /// Category the rule belongs to.
        category: String,
        /// Why the rule was rejected.
        reason: String,
    },

    /// Filesystem access failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation was on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Run state could not be encoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The `SQLite` checkpoint store reported an error.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DomainError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must end the convergence loop.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ToolInvocation(_) | Self::ParseAmbiguity(_) | Self::CheckpointWrite { .. }
        )
    }
}

/// Result alias used throughout the domain and services.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
