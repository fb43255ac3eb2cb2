//! Domain models: error records, categories, run state and configuration.

pub mod agent_result;
pub mod category;
pub mod config;
pub mod error_record;
pub mod run_state;
pub mod stop;

pub use agent_result::{AgentOutcome, AgentResult, FixReport};
pub use category::{AgentSpec, CategoryConfig, MatchField, MatchRule, RewriteScope};
pub use config::{
    BuildConfig, CheckpointBackend, CheckpointConfig, Config, ConvergenceConfig, LoggingConfig,
};
pub use error_record::{CategoryId, ErrorKey, ErrorRecord, UNCATEGORIZED};
pub use run_state::{FailureKind, IterationRecord, RunState, RunStatus, RUN_STATE_SCHEMA_VERSION};
pub use stop::StopSignal;
