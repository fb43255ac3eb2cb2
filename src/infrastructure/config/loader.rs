//! Layered configuration loading and validation.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::{AgentSpec, MatchRule, UNCATEGORIZED};

/// Project configuration directory, relative to the working directory.
pub const CONFIG_DIR: &str = ".buildfix";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `convergence.max_iterations` is zero.
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    /// `convergence.stall_threshold` is zero.
    #[error("Invalid stall_threshold: {0}. Must be at least 1")]
    InvalidStallThreshold(u32),

    /// `convergence.max_workers` is out of range.
    #[error("Invalid max_workers: {0}. Must be between 1 and 64")]
    InvalidMaxWorkers(usize),

    /// `build.program` is blank.
    #[error("Build program cannot be empty")]
    EmptyBuildProgram,

    /// Unknown `logging.level`.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown `logging.format`.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown `logging.rotation`.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// A category has a blank id.
    #[error("Category id cannot be empty")]
    EmptyCategoryId,

    /// Two categories share an id.
    #[error("Duplicate category id: {0}")]
    DuplicateCategory(String),

    /// A category uses the reserved `uncategorized` id.
    #[error("Category id '{0}' is reserved")]
    ReservedCategory(String),

    /// A category would never match anything.
    #[error("Category '{0}' has no match rules")]
    NoRules(String),

    /// A regex rule does not compile.
    #[error("Invalid rule in category '{category}': {reason}")]
    InvalidRule {
        /// Offending category id.
        category: String,
        /// Why the rule was rejected.
        reason: String,
    },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .buildfix/config.yaml (project config, created by init)
    /// 3. .buildfix/local.yaml (project local overrides, optional)
    /// 4. Environment variables (BUILDFIX_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_in(Path::new("."))
    }

    /// [`load`](Self::load) with the project files looked up under `root`.
    pub fn load_in(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("BUILDFIX_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment variables still
    /// override it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("BUILDFIX_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let convergence = &config.convergence;
        if convergence.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(convergence.max_iterations));
        }
        if convergence.stall_threshold == 0 {
            return Err(ConfigError::InvalidStallThreshold(convergence.stall_threshold));
        }
        if !(1..=64).contains(&convergence.max_workers) {
            return Err(ConfigError::InvalidMaxWorkers(convergence.max_workers));
        }

        if config.build.program.trim().is_empty() {
            return Err(ConfigError::EmptyBuildProgram);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let mut seen = HashSet::new();
        for category in &config.categories {
            let id = category.id.as_str();
            if id.trim().is_empty() {
                return Err(ConfigError::EmptyCategoryId);
            }
            if id == UNCATEGORIZED {
                return Err(ConfigError::ReservedCategory(id.to_string()));
            }
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateCategory(id.to_string()));
            }
            if category.rules.is_empty() {
                return Err(ConfigError::NoRules(id.to_string()));
            }

            let invalid = |reason: String| ConfigError::InvalidRule {
                category: id.to_string(),
                reason,
            };
            for rule in &category.rules {
                match rule {
                    MatchRule::Code { value } | MatchRule::CodePrefix { value }
                        if value.is_empty() =>
                    {
                        return Err(invalid("empty code".to_string()));
                    }
                    MatchRule::MessageContains { text, .. } if text.is_empty() => {
                        return Err(invalid("empty message_contains text".to_string()));
                    }
                    MatchRule::Regex { pattern, .. } => {
                        regex::Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
                    }
                    _ => {}
                }
            }

            match &category.agent {
                AgentSpec::TextRewrite { find, .. } => {
                    regex::Regex::new(find).map_err(|e| invalid(e.to_string()))?;
                }
                AgentSpec::Formatter { program, .. } if program.trim().is_empty() => {
                    return Err(invalid("formatter program cannot be empty".to_string()));
                }
                AgentSpec::InsertDeclaration {
                    message_pattern,
                    anchor,
                    ..
                } => {
                    for pattern in message_pattern.iter().chain(anchor.iter()) {
                        regex::Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}
