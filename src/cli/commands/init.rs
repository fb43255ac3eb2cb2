//! Implementation of the `buildfix init` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::CONFIG_DIR;
use crate::infrastructure::fs::write_atomic;

/// Annotated starting configuration for a C#/MSBuild solution.
pub const EXAMPLE_CONFIG: &str = include_str!("../../../config/example.yaml");

/// Arguments of `init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Result of `init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether the file was written.
    pub success: bool,
    /// Outcome shown to the user.
    pub message: String,
    /// Path of the written configuration file.
    pub config_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        if self.success {
            format!(
                "{}\n\nEdit the categories in {} to match your build, then run `buildfix simulate`.",
                self.message,
                self.config_path.display()
            )
        } else {
            self.message.clone()
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Write the example configuration.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<i32> {
    let config_path = args.path.join(CONFIG_DIR).join("config.yaml");

    if config_path.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite.".to_string(),
            config_path,
        };
        output(&output_data, json_mode);
        return Ok(0);
    }

    let target = config_path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&target, EXAMPLE_CONFIG.as_bytes()))
        .await
        .context("Config writer task failed")?
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    tracing::info!(path = %config_path.display(), "Wrote example configuration");

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Configuration reinitialized.".to_string()
        } else {
            "Configuration initialized.".to_string()
        },
        config_path,
    };
    output(&output_data, json_mode);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_config_once_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_DIR).join("config.yaml");

        let args = || InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        assert_eq!(execute(args(), true).await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);

        std::fs::write(&path, "workspace: custom\n").unwrap();
        execute(args(), true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "workspace: custom\n");

        execute(
            InitArgs {
                force: true,
                path: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }
}
