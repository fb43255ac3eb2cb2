//! Build tool port: the external command whose diagnostics drive the loop.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Raw result of one build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Process exit code; `None` when the process was killed by a signal or
    /// timed out.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl BuildOutput {
    /// Bundle one invocation's exit code and output.
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the tool exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the tool printed nothing at all.
    pub fn is_silent(&self) -> bool {
        self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }

    /// Stdout followed by stderr; compilers disagree on which stream carries
    /// diagnostics.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Something that compiles the tree and reports diagnostics.
///
/// Implementations return `Err(DomainError::ToolInvocation)` only when the
/// command could not be run at all. A build that runs and fails is a normal
/// `Ok` with a non-zero exit code.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Run the build once.
    async fn build(&self) -> DomainResult<BuildOutput>;
}
