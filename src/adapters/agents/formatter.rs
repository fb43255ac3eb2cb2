//! External formatter / code generation agent.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ErrorRecord, FixReport};
use crate::domain::ports::{errors_by_file, FileGrant, FixAgent};

/// Placeholder in `args` replaced with the target file path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Runs an external tool once per granted file.
///
/// Every path is checked against the grant before the tool sees it. The tool
/// exiting successfully counts every error in that file as resolved; the
/// next build decides whether that was true.
#[derive(Debug, Clone)]
pub struct FormatterAgent {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl FormatterAgent {
    /// `args` may contain [`FILE_PLACEHOLDER`]; otherwise the path is appended.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn args_for(&self, file: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(FILE_PLACEHOLDER, file)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(file.to_string());
        }
        args
    }
}

#[async_trait]
impl FixAgent for FormatterAgent {
    fn name(&self) -> &str {
        "formatter"
    }

    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport> {
        let mut report = FixReport::default();

        for (path, file_errors) in errors_by_file(errors) {
            if grant.stop_requested() {
                break;
            }

            let target = grant.authorize(path)?;
            let before = grant.read(&target).await?;
            let args = self.args_for(&target.to_string_lossy());

            tracing::debug!(
                program = %self.program,
                file = %target.display(),
                "Running formatter"
            );

            let run = Command::new(&self.program)
                .args(&args)
                .current_dir(grant.root())
                .kill_on_drop(true)
                .output();
            let output = tokio::time::timeout(self.timeout, run)
                .await
                .map_err(|_| DomainError::AgentFailed {
                    agent: self.name().to_string(),
                    reason: format!(
                        "{} timed out after {}s on {}",
                        self.program,
                        self.timeout.as_secs(),
                        target.display()
                    ),
                })?
                .map_err(|e| DomainError::AgentFailed {
                    agent: self.name().to_string(),
                    reason: format!("failed to spawn {}: {e}", self.program),
                })?;

            if !output.status.success() {
                tracing::warn!(
                    program = %self.program,
                    file = %target.display(),
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Formatter reported failure"
                );
                continue;
            }

            report.resolve(file_errors.len());
            if grant.read(&target).await? != before {
                report.touch(target);
            }
        }

        Ok(report)
    }
}
