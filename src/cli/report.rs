//! Rendering of a run's state for `fix`, `resume` and `status`.

use serde::Serialize;

use crate::domain::models::{AgentOutcome, RunState, RunStatus};

use super::output::{colorize_status, list_table, section_header, truncate, CommandOutput};

/// Process exit code for a run that ended in `status`.
pub const fn exit_code(status: &RunStatus) -> i32 {
    match status {
        RunStatus::Converged => 0,
        RunStatus::Exhausted => 2,
        RunStatus::Stalled => 3,
        RunStatus::Running | RunStatus::Failed { .. } => 4,
    }
}

/// One history entry of a [`RunReport`].
#[derive(Debug, Serialize)]
pub struct IterationRow {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Errors of the build the iteration started from.
    pub errors_before: usize,
    /// `None` when the post-fix build could not be evaluated.
    pub errors_after: Option<usize>,
    /// Errors agents claimed to resolve.
    pub resolved: usize,
    /// Errors deferred to the next iteration.
    pub deferred: usize,
    /// Errors no rule matched.
    pub uncategorized: usize,
    /// Agents whose dispatch failed.
    pub failed_agents: Vec<String>,
    /// Whether a stop cut the iteration short.
    pub interrupted: bool,
}

/// Remaining errors of one category.
#[derive(Debug, Serialize)]
pub struct CategoryRow {
    /// Category id.
    pub category: String,
    /// Errors in that category.
    pub errors: usize,
}

/// Summary of one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Unique run id.
    pub run_id: String,
    /// Status label, see [`RunStatus::label`].
    pub status: String,
    /// Failure message for failed runs.
    pub detail: Option<String>,
    /// Process exit code the status maps to.
    pub exit_code: i32,
    /// Iterations committed.
    pub iterations: u32,
    /// Iteration budget.
    pub max_iterations: u32,
    /// Error count of the last build.
    pub remaining_errors: Option<usize>,
    /// Errors without a file location.
    pub unlocated: usize,
    /// Categories with errors left, largest first.
    pub unresolved: Vec<CategoryRow>,
    /// Committed iterations, oldest first.
    pub history: Vec<IterationRow>,
}

impl From<&RunState> for RunReport {
    fn from(state: &RunState) -> Self {
        let detail = match &state.status {
            RunStatus::Failed { kind, detail } => Some(format!("{kind:?}: {detail}")),
            _ => None,
        };
        Self {
            run_id: state.run_id.clone(),
            status: state.status.label().to_string(),
            detail,
            exit_code: exit_code(&state.status),
            iterations: state.current_iteration,
            max_iterations: state.max_iterations,
            remaining_errors: state.last_error_count,
            unlocated: state.unlocated,
            unresolved: state
                .unresolved_categories()
                .into_iter()
                .map(|(id, errors)| CategoryRow {
                    category: id.to_string(),
                    errors,
                })
                .collect(),
            history: state
                .history
                .iter()
                .map(|record| IterationRow {
                    iteration: record.iteration,
                    errors_before: record.errors_before,
                    errors_after: record.errors_after,
                    resolved: record.resolved_total(),
                    deferred: record.deferred_total(),
                    uncategorized: record.uncategorized,
                    failed_agents: record
                        .results
                        .iter()
                        .filter(|r| r.outcome == AgentOutcome::Failed)
                        .map(|r| r.category.to_string())
                        .collect(),
                    interrupted: record.interrupted,
                })
                .collect(),
        }
    }
}

impl CommandOutput for RunReport {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Run: {}", self.run_id),
            format!("Status: {}", colorize_status(&self.status)),
        ];
        if let Some(detail) = &self.detail {
            lines.push(format!("Reason: {detail}"));
        }
        lines.push(format!(
            "Iterations: {}/{}",
            self.iterations, self.max_iterations
        ));
        if let Some(remaining) = self.remaining_errors {
            lines.push(format!("Remaining errors: {remaining}"));
        }

        if !self.history.is_empty() {
            lines.push(section_header("History"));
            let mut table = list_table(&[
                "iter", "before", "after", "resolved", "deferred", "uncat", "failed",
            ]);
            for row in &self.history {
                let after = match (row.errors_after, row.interrupted) {
                    (Some(after), _) => after.to_string(),
                    (None, true) => "interrupted".to_string(),
                    (None, false) => "-".to_string(),
                };
                table.add_row(vec![
                    row.iteration.to_string(),
                    row.errors_before.to_string(),
                    after,
                    row.resolved.to_string(),
                    row.deferred.to_string(),
                    row.uncategorized.to_string(),
                    truncate(&row.failed_agents.join(","), 40),
                ]);
            }
            lines.push(table.to_string());
        }

        if !self.unresolved.is_empty() || self.unlocated > 0 {
            lines.push(section_header("Unresolved"));
            let mut table = list_table(&["category", "errors"]);
            for row in &self.unresolved {
                table.add_row(vec![row.category.clone(), row.errors.to_string()]);
            }
            if self.unlocated > 0 {
                table.add_row(vec!["(no location)".to_string(), self.unlocated.to_string()]);
            }
            lines.push(table.to_string());
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Listing for `status --all`.
#[derive(Debug, Serialize)]
pub struct RunListOutput {
    /// Every stored run, most recently updated first.
    pub runs: Vec<RunReport>,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return "No runs found.".to_string();
        }
        let mut table = list_table(&["run", "status", "iterations", "remaining"]);
        for run in &self.runs {
            table.add_row(vec![
                run.run_id.clone(),
                colorize_status(&run.status).to_string(),
                format!("{}/{}", run.iterations, run.max_iterations),
                run.remaining_errors
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
            ]);
        }
        format!("{} run(s):\n{table}", self.runs.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CategoryId, FailureKind, IterationRecord};

    #[test]
    fn exit_codes_follow_status() {
        assert_eq!(exit_code(&RunStatus::Converged), 0);
        assert_eq!(exit_code(&RunStatus::Exhausted), 2);
        assert_eq!(exit_code(&RunStatus::Stalled), 3);
        assert_eq!(
            exit_code(&RunStatus::Failed {
                kind: FailureKind::Interrupted,
                detail: "stop".into()
            }),
            4
        );
    }

    #[test]
    fn report_lists_history_and_unresolved() {
        let mut state = RunState::with_id("run-1", 5);
        state.push_iteration(IterationRecord {
            iteration: 1,
            errors_before: 10,
            errors_after: Some(4),
            uncategorized: 1,
            unlocated: 0,
            results: vec![],
            interrupted: false,
            timestamp: chrono::Utc::now(),
        });
        state.outstanding.insert(CategoryId::new("dupes"), 3);
        state.outstanding.insert(CategoryId::uncategorized(), 1);
        state.last_error_count = Some(4);
        state.set_status(RunStatus::Stalled);

        let report = RunReport::from(&state);
        assert_eq!(report.exit_code, 3);
        assert_eq!(report.unresolved[0].category, "dupes");
        assert_eq!(report.history[0].errors_after, Some(4));

        let human = report.to_human();
        assert!(human.contains("run-1"));
        assert!(human.contains("dupes"));
        assert_eq!(report.to_json()["status"], "stalled");
    }
}
