//! Configuration model, deserialized from YAML and environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::category::CategoryConfig;

/// Main configuration structure for buildfix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root of the source tree agents operate on
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// External build command
    #[serde(default)]
    pub build: BuildConfig,

    /// Iteration control
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ordered category table; earlier entries win ties
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            build: BuildConfig::default(),
            convergence: ConvergenceConfig::default(),
            checkpoint: CheckpointConfig::default(),
            logging: LoggingConfig::default(),
            categories: vec![],
        }
    }
}

/// Build command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildConfig {
    /// Program to execute
    #[serde(default = "default_build_program")]
    pub program: String,

    /// Arguments passed to the program
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,

    /// Directory to run the build in (defaults to the workspace)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Kill the build after this many seconds
    #[serde(default = "default_build_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_build_program() -> String {
    "dotnet".to_string()
}

fn default_build_args() -> Vec<String> {
    vec!["build".to_string(), "--no-incremental".to_string()]
}

const fn default_build_timeout_secs() -> u64 {
    1800
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            args: default_build_args(),
            working_dir: None,
            timeout_secs: default_build_timeout_secs(),
        }
    }
}

/// Convergence loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Iteration budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive non-improving iterations before the run is stalled
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,

    /// Maximum agents running at once (1-64)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-agent timeout in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
}

const fn default_max_iterations() -> u32 {
    10
}

const fn default_stall_threshold() -> u32 {
    2
}

const fn default_max_workers() -> usize {
    4
}

const fn default_agent_timeout_secs() -> u64 {
    600
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            stall_threshold: default_stall_threshold(),
            max_workers: default_max_workers(),
            agent_timeout_secs: default_agent_timeout_secs(),
        }
    }
}

/// Checkpoint storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    /// One JSON document per run
    #[default]
    Json,
    /// `SQLite` table of JSON documents
    Sqlite,
}

/// Checkpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: CheckpointBackend,

    /// Directory (json) or database file (sqlite); backend default if unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CheckpointConfig {
    /// Storage location, falling back to the backend's default.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| match self.backend {
            CheckpointBackend::Json => PathBuf::from(".buildfix/runs"),
            CheckpointBackend::Sqlite => PathBuf::from(".buildfix/buildfix.db"),
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
