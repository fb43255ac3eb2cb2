//! External build command.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::BuildConfig;
use crate::domain::ports::{BuildOutput, BuildTool};

/// Runs a configured command (e.g. `dotnet build --no-incremental`) and
/// captures both output streams.
#[derive(Debug, Clone)]
pub struct CommandBuildTool {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CommandBuildTool {
    /// Run `program args...` in `working_dir`, killing it after `timeout`.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Build from configuration; the working directory defaults to the
    /// workspace.
    pub fn from_config(config: &BuildConfig, workspace: &std::path::Path) -> Self {
        let working_dir = config
            .working_dir
            .as_ref()
            .map_or_else(|| workspace.to_path_buf(), |dir| workspace.join(dir));
        Self::new(
            config.program.clone(),
            config.args.clone(),
            working_dir,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// The command line, for logs and reports.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl BuildTool for CommandBuildTool {
    fn name(&self) -> &str {
        &self.program
    }

    async fn build(&self) -> DomainResult<BuildOutput> {
        tracing::info!(
            command = %self.command_line(),
            working_dir = %self.working_dir.display(),
            "Running build"
        );
        let started = Instant::now();

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(program = %self.program, error = %e, "Failed to spawn build command");
                DomainError::ToolInvocation(format!("failed to spawn {}: {e}", self.program))
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                DomainError::ToolInvocation(format!(
                    "{} timed out after {}s",
                    self.command_line(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DomainError::ToolInvocation(format!("failed to wait for build: {e}")))?;

        let result = BuildOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::info!(
            exit_code = ?result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Build finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_tool_invocation_error() {
        let tool = CommandBuildTool::new(
            "definitely-not-a-real-build-tool",
            vec![],
            ".",
            Duration::from_secs(5),
        );
        let err = tool.build().await.unwrap_err();
        assert!(matches!(err, DomainError::ToolInvocation(_)));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let tool = CommandBuildTool::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
            ".",
            Duration::from_secs(10),
        );
        let output = tool.build().await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_tool_invocation_error() {
        let tool = CommandBuildTool::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            ".",
            Duration::from_millis(100),
        );
        assert!(matches!(
            tool.build().await,
            Err(DomainError::ToolInvocation(_))
        ));
    }

    #[test]
    fn working_dir_is_relative_to_workspace() {
        let config = BuildConfig {
            working_dir: Some(PathBuf::from("src")),
            ..BuildConfig::default()
        };
        let tool = CommandBuildTool::from_config(&config, std::path::Path::new("/ws"));
        assert_eq!(tool.working_dir, PathBuf::from("/ws/src"));
        assert_eq!(tool.command_line(), "dotnet build --no-incremental");
    }
}
