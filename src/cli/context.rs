//! Wiring shared by the commands: configuration, stores and the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::build::CommandBuildTool;
use crate::adapters::checkpoint::JsonFileCheckpointStore;
use crate::adapters::sqlite::SqliteCheckpointStore;
use crate::domain::models::{CheckpointBackend, Config, StopSignal};
use crate::domain::ports::{BuildTool, CheckpointStore};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    AgentRegistry, Classifier, ConvergenceLoop, LoopConfig, Scheduler, SchedulerConfig,
};

/// Command-line overrides of the `convergence` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOverrides {
    /// `--max-iterations`
    pub max_iterations: Option<u32>,
    /// `--stall-threshold`
    pub stall_threshold: Option<u32>,
    /// `--workers`
    pub workers: Option<usize>,
}

/// Loaded configuration plus the absolute workspace path.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Loaded configuration, overrides applied.
    pub config: Config,
    /// Absolute path of the source tree.
    pub workspace: PathBuf,
}

impl AppContext {
    /// Load configuration (`--config` or the project files) and resolve the
    /// workspace, with `--workspace` taking precedence.
    pub fn load(config_path: Option<&Path>, workspace: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        if let Some(workspace) = workspace {
            config.workspace = workspace.to_path_buf();
        }
        Self::from_config(config)
    }

    /// Resolve the workspace of an already loaded configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let workspace = std::path::absolute(&config.workspace).with_context(|| {
            format!("Failed to resolve workspace {}", config.workspace.display())
        })?;
        if !workspace.is_dir() {
            anyhow::bail!("Workspace {} is not a directory", workspace.display());
        }
        Ok(Self { config, workspace })
    }

    /// Apply `fix` flags on top of the loaded configuration.
    pub fn apply(&mut self, overrides: LoopOverrides) -> Result<()> {
        let convergence = &mut self.config.convergence;
        if let Some(max_iterations) = overrides.max_iterations {
            convergence.max_iterations = max_iterations;
        }
        if let Some(stall_threshold) = overrides.stall_threshold {
            convergence.stall_threshold = stall_threshold;
        }
        if let Some(workers) = overrides.workers {
            convergence.max_workers = workers;
        }
        ConfigLoader::validate(&self.config)?;
        Ok(())
    }

    /// Open the configured checkpoint store.
    pub async fn open_store(&self) -> Result<Arc<dyn CheckpointStore>> {
        let path = self.config.checkpoint.resolved_path();
        match self.config.checkpoint.backend {
            CheckpointBackend::Json => Ok(Arc::new(JsonFileCheckpointStore::new(path))),
            CheckpointBackend::Sqlite => {
                let store = SqliteCheckpointStore::open(&path).await.with_context(|| {
                    format!("Failed to open checkpoint database {}", path.display())
                })?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Build command adapter for the configured workspace.
    pub fn build_tool(&self) -> Arc<dyn BuildTool> {
        Arc::new(CommandBuildTool::from_config(&self.config.build, &self.workspace))
    }

    /// Assemble the convergence loop from configuration.
    pub fn convergence_loop(
        &self,
        store: Arc<dyn CheckpointStore>,
        stop: StopSignal,
    ) -> Result<ConvergenceLoop> {
        let categories = &self.config.categories;
        let convergence = &self.config.convergence;

        let classifier =
            Classifier::from_categories(categories).context("Failed to compile category rules")?;
        let registry =
            AgentRegistry::from_categories(categories).context("Failed to create fix agents")?;
        let priority = categories.iter().map(|c| c.id.clone()).collect();
        let scheduler = Scheduler::new(
            registry,
            priority,
            SchedulerConfig {
                workspace: self.workspace.clone(),
                max_workers: convergence.max_workers,
                agent_timeout: Duration::from_secs(convergence.agent_timeout_secs),
            },
        );

        Ok(ConvergenceLoop::new(
            self.build_tool(),
            classifier,
            scheduler,
            store,
            LoopConfig {
                max_iterations: convergence.max_iterations,
                stall_threshold: convergence.stall_threshold,
            },
        )
        .with_stop_signal(stop))
    }
}

/// A stop signal that trips on Ctrl-C. Agents finish their current file and
/// the run is checkpointed as interrupted.
pub fn ctrl_c_stop_signal() -> StopSignal {
    let stop = StopSignal::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after in-flight work");
            trigger.trigger();
        }
    });
    stop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            workspace: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut ctx = AppContext::from_config(config).unwrap();

        ctx.apply(LoopOverrides {
            max_iterations: Some(3),
            workers: Some(8),
            ..LoopOverrides::default()
        })
        .unwrap();
        assert_eq!(ctx.config.convergence.max_iterations, 3);
        assert_eq!(ctx.config.convergence.max_workers, 8);

        assert!(ctx
            .apply(LoopOverrides {
                stall_threshold: Some(0),
                ..LoopOverrides::default()
            })
            .is_err());
    }

    #[test]
    fn missing_workspace_is_rejected() {
        let config = Config {
            workspace: PathBuf::from("/definitely/not/a/workspace"),
            ..Config::default()
        };
        assert!(AppContext::from_config(config).is_err());
    }

    #[tokio::test]
    async fn opens_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            workspace: dir.path().to_path_buf(),
            ..Config::default()
        };
        config.checkpoint.backend = CheckpointBackend::Sqlite;
        config.checkpoint.path = Some(dir.path().join("runs.db"));
        let ctx = AppContext::from_config(config).unwrap();

        let store = ctx.open_store().await.unwrap();
        assert!(store.latest().await.unwrap().is_none());
    }
}
