//! Convergence run state: the iteration history and the loop's status.
//!
//! [`RunState`] is the document the checkpoint store persists after every
//! iteration boundary. It is versioned so that a newer binary can refuse to
//! misread an older checkpoint and vice versa.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_result::AgentResult;
use super::error_record::CategoryId;

/// Current checkpoint schema version.
pub const RUN_STATE_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Why a run ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The build command could not be run or its output was unusable.
    ToolInvocation,
    /// A stop signal arrived.
    Interrupted,
}

/// Lifecycle of a convergence run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Iterations remain and no end condition has been met.
    Running,
    /// The build reports zero errors.
    Converged,
    /// The iteration budget ran out with errors remaining.
    Exhausted,
    /// The error count stopped decreasing for too many iterations.
    Stalled,
    /// The run ended early; `resume` may continue it.
    Failed {
        /// What ended the run.
        kind: FailureKind,
        /// Error message of the failure.
        detail: String,
    },
}

impl RunStatus {
    /// Whether the run has ended, successfully or not.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether `resume` may continue a run in this status.
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Failed { .. })
    }

    /// Lowercase name used in reports.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Stalled => "stalled",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { kind, detail } => write!(f, "failed ({kind:?}: {detail})"),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// IterationRecord
// ---------------------------------------------------------------------------

/// One analyze → classify → dispatch → rebuild cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Error count of the build this iteration started from.
    pub errors_before: usize,
    /// `None` when the post-fix build could not be evaluated.
    pub errors_after: Option<usize>,
    /// Errors no rule matched; never dispatched.
    #[serde(default)]
    pub uncategorized: usize,
    /// Errors without a file location; never dispatched.
    #[serde(default)]
    pub unlocated: usize,
    /// One entry per dispatched category.
    pub results: Vec<AgentResult>,
    /// The iteration was cut short by a stop signal.
    #[serde(default)]
    pub interrupted: bool,
    /// When the iteration was committed.
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    /// Whether the post-fix build measured no improvement. An iteration
    /// without a post-fix count measured nothing and is never stalled.
    pub fn is_stalled(&self) -> bool {
        self.errors_after
            .is_some_and(|after| after >= self.errors_before)
    }

    /// Whether the post-fix build produced an error count.
    pub fn is_measured(&self) -> bool {
        self.errors_after.is_some()
    }

    /// Errors the agents claimed to resolve.
    pub fn resolved_total(&self) -> usize {
        self.results.iter().map(|r| r.resolved).sum()
    }

    /// Errors left for the next iteration because their file was locked.
    pub fn deferred_total(&self) -> usize {
        self.results.iter().map(|r| r.deferred).sum()
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Durable state of a convergence run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Document layout version, see [`RUN_STATE_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Unique id, a v4 UUID unless chosen by the caller.
    pub run_id: String,
    /// Number of iterations committed so far.
    pub current_iteration: u32,
    /// Iteration budget.
    pub max_iterations: u32,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Committed iterations, oldest first.
    pub history: Vec<IterationRecord>,
    /// Error count of the most recent build, if one has been evaluated.
    #[serde(default)]
    pub last_error_count: Option<usize>,
    /// Per-category error counts of the most recent build.
    #[serde(default)]
    pub outstanding: BTreeMap<CategoryId, usize>,
    /// Location-less errors of the most recent build.
    #[serde(default)]
    pub unlocated: usize,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the state was last changed.
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Start a fresh run with a generated id.
    pub fn new(max_iterations: u32) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), max_iterations)
    }

    /// Start a fresh run with a caller-chosen id.
    pub fn with_id(run_id: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        Self {
            schema_version: RUN_STATE_SCHEMA_VERSION,
            run_id: run_id.into(),
            current_iteration: 0,
            max_iterations,
            status: RunStatus::Running,
            history: Vec::new(),
            last_error_count: None,
            outstanding: BTreeMap::new(),
            unlocated: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Append a committed iteration and advance the counter.
    pub fn push_iteration(&mut self, record: IterationRecord) {
        self.current_iteration = record.iteration;
        self.last_error_count = record.errors_after;
        self.history.push(record);
        self.touch();
    }

    /// Move to `status` and bump `updated_at`.
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.touch();
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Number of most recent consecutive measured iterations without
    /// improvement. Iterations without a post-fix count (interrupted, or the
    /// rebuild failed) are skipped.
    pub fn trailing_stall_streak(&self) -> u32 {
        let streak = self
            .history
            .iter()
            .rev()
            .filter(|record| record.is_measured())
            .take_while(|record| record.is_stalled())
            .count();
        u32::try_from(streak).unwrap_or(u32::MAX)
    }

    /// Whether `max_iterations` iterations have been committed.
    pub fn budget_spent(&self) -> bool {
        self.current_iteration >= self.max_iterations
    }

    /// Categories that still have errors, largest first.
    pub fn unresolved_categories(&self) -> Vec<(&CategoryId, usize)> {
        let mut rows: Vec<_> = self
            .outstanding
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(id, &count)| (id, count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iteration: u32, before: usize, after: Option<usize>) -> IterationRecord {
        IterationRecord {
            iteration,
            errors_before: before,
            errors_after: after,
            uncategorized: 0,
            unlocated: 0,
            results: Vec::new(),
            interrupted: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn stall_streak_counts_trailing_non_improving_iterations() {
        let mut state = RunState::with_id("run", 10);
        state.push_iteration(record(1, 50, Some(40)));
        assert_eq!(state.trailing_stall_streak(), 0);

        state.push_iteration(record(2, 40, Some(40)));
        state.push_iteration(record(3, 40, Some(45)));
        assert_eq!(state.trailing_stall_streak(), 2);

        state.push_iteration(record(4, 45, Some(10)));
        assert_eq!(state.trailing_stall_streak(), 0);
        assert_eq!(state.current_iteration, 4);
        assert_eq!(state.last_error_count, Some(10));
    }

    #[test]
    fn missing_post_count_is_not_a_stall() {
        assert!(!record(1, 5, None).is_stalled());
    }

    #[test]
    fn failed_rebuild_does_not_extend_the_streak() {
        let mut state = RunState::with_id("run", 10);
        state.push_iteration(record(1, 20, None));
        assert_eq!(state.trailing_stall_streak(), 0);

        state.push_iteration(record(2, 10, Some(10)));
        assert_eq!(state.trailing_stall_streak(), 1);
    }

    #[test]
    fn interrupted_iterations_do_not_affect_the_streak() {
        let mut state = RunState::with_id("run", 10);
        state.push_iteration(record(1, 50, Some(50)));
        let mut cut_short = record(2, 50, None);
        cut_short.interrupted = true;
        state.push_iteration(cut_short);
        assert_eq!(state.trailing_stall_streak(), 1);

        state.push_iteration(record(3, 50, Some(50)));
        assert_eq!(state.trailing_stall_streak(), 2);
    }

    #[test]
    fn resumable_statuses() {
        assert!(RunStatus::Running.is_resumable());
        assert!(RunStatus::Failed {
            kind: FailureKind::Interrupted,
            detail: "ctrl-c".into()
        }
        .is_resumable());
        assert!(!RunStatus::Converged.is_resumable());
        assert!(!RunStatus::Stalled.is_resumable());
        assert!(!RunStatus::Exhausted.is_resumable());
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let json = serde_json::to_value(RunStatus::Failed {
            kind: FailureKind::ToolInvocation,
            detail: "exit 1".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["kind"], "tool_invocation");

        let json = serde_json::to_value(RunStatus::Converged).unwrap();
        assert_eq!(json["state"], "converged");
    }

    #[test]
    fn unresolved_categories_sorted_by_count() {
        let mut state = RunState::with_id("run", 3);
        state.outstanding.insert(CategoryId::new("a"), 2);
        state.outstanding.insert(CategoryId::new("b"), 9);
        state.outstanding.insert(CategoryId::new("c"), 0);

        let rows = state.unresolved_categories();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.as_str(), "b");
        assert_eq!(rows[1].0.as_str(), "a");
    }
}
