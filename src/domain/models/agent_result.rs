//! Per-category outcome of one agent dispatch.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error_record::CategoryId;

/// How an agent dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    /// Every attempted error was resolved.
    Success,
    /// Some, but not all, attempted errors were resolved.
    Partial,
    /// Nothing was resolved, the agent errored, or it broke its grant.
    Failed,
    /// No file could be locked; all errors were deferred.
    Skipped,
}

impl AgentOutcome {
    /// Lowercase name used in checkpoints and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an agent reports back after a `fix` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    /// Number of the supplied errors the agent believes it fixed.
    pub resolved: usize,
    /// Files the agent actually rewrote.
    pub files_touched: BTreeSet<PathBuf>,
}

impl FixReport {
    /// Credit `count` more resolved errors.
    pub fn resolve(&mut self, count: usize) {
        self.resolved += count;
    }

    /// Record that `path` was rewritten.
    pub fn touch(&mut self, path: impl Into<PathBuf>) {
        self.files_touched.insert(path.into());
    }
}

/// Result of dispatching one category's agent within an iteration.
///
/// Invariant: `resolved <= attempted`. Deferred errors (files held by
/// another agent) are counted separately and retried next iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Category the agent was dispatched for.
    pub category: CategoryId,
    /// Agent variant name.
    pub agent: String,
    /// Errors handed to the agent.
    pub attempted: usize,
    /// Errors the agent claims to have resolved, capped at `attempted`.
    pub resolved: usize,
    /// Errors held back because another category locked the file.
    #[serde(default)]
    pub deferred: usize,
    /// Files the agent rewrote.
    #[serde(default)]
    pub files_touched: Vec<PathBuf>,
    /// How the dispatch ended.
    pub outcome: AgentOutcome,
    /// Failure reason, when the outcome is `failed` for a reason other than
    /// "nothing resolved".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AgentResult {
    /// Build a result from an agent's report, clamping `resolved` to the
    /// number of attempted errors.
    pub fn from_report(
        category: CategoryId,
        agent: impl Into<String>,
        attempted: usize,
        deferred: usize,
        report: FixReport,
    ) -> Self {
        let resolved = report.resolved.min(attempted);
        let outcome = if attempted == 0 {
            AgentOutcome::Skipped
        } else if resolved == attempted {
            AgentOutcome::Success
        } else if resolved > 0 {
            AgentOutcome::Partial
        } else {
            AgentOutcome::Failed
        };

        Self {
            category,
            agent: agent.into(),
            attempted,
            resolved,
            deferred,
            files_touched: report.files_touched.into_iter().collect(),
            outcome,
            detail: None,
        }
    }

    /// A dispatch that ended in an error or contract violation.
    pub fn failed(
        category: CategoryId,
        agent: impl Into<String>,
        attempted: usize,
        deferred: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            agent: agent.into(),
            attempted,
            resolved: 0,
            deferred,
            files_touched: Vec::new(),
            outcome: AgentOutcome::Failed,
            detail: Some(reason.into()),
        }
    }

    /// A category whose lock request came back empty.
    pub fn skipped(category: CategoryId, agent: impl Into<String>, deferred: usize) -> Self {
        Self {
            category,
            agent: agent.into(),
            attempted: 0,
            resolved: 0,
            deferred,
            files_touched: Vec::new(),
            outcome: AgentOutcome::Skipped,
            detail: Some("no files granted".to_string()),
        }
    }

    /// Whether this dispatch resolved at least one error.
    pub const fn made_progress(&self) -> bool {
        self.resolved > 0
    }
}
