//! Implementation of the `buildfix simulate` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::StopSignal;
use crate::services::Simulation;

/// Planned dispatch of one category.
#[derive(Debug, Serialize)]
pub struct DispatchRow {
    /// Category id.
    pub category: String,
    /// `None` when no agent is bound.
    pub agent: Option<String>,
    /// Errors in granted files.
    pub errors: usize,
    /// Files that would be locked.
    pub files: Vec<String>,
    /// Errors in files another category holds.
    pub deferred: usize,
}

/// Result of `simulate`.
#[derive(Debug, Serialize)]
pub struct SimulateOutput {
    /// Errors the build reported.
    pub error_count: usize,
    /// Errors without a file location.
    pub unlocated: usize,
    /// Errors no rule matched.
    pub uncategorized: usize,
    /// Dispatches in lock request order.
    pub dispatches: Vec<DispatchRow>,
}

impl From<&Simulation> for SimulateOutput {
    fn from(simulation: &Simulation) -> Self {
        Self {
            error_count: simulation.error_count,
            unlocated: simulation.unlocated,
            uncategorized: simulation.plan.uncategorized,
            dispatches: simulation
                .plan
                .dispatches
                .iter()
                .map(|dispatch| DispatchRow {
                    category: dispatch.category.to_string(),
                    agent: dispatch.agent.clone(),
                    errors: dispatch.errors.len(),
                    files: dispatch
                        .granted
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect(),
                    deferred: dispatch.deferred,
                })
                .collect(),
        }
    }
}

impl CommandOutput for SimulateOutput {
    fn to_human(&self) -> String {
        if self.error_count == 0 {
            return "Build is clean; nothing to dispatch.".to_string();
        }

        let mut table = list_table(&["category", "agent", "errors", "files", "deferred"]);
        for row in &self.dispatches {
            table.add_row(vec![
                row.category.clone(),
                row.agent.clone().unwrap_or_else(|| "-".to_string()),
                row.errors.to_string(),
                row.files.len().to_string(),
                row.deferred.to_string(),
            ]);
        }

        let mut lines = vec![
            format!("Iteration 1 would dispatch {} categor(ies):", self.dispatches.len()),
            table.to_string(),
        ];
        if self.uncategorized > 0 {
            lines.push(format!("{} uncategorized error(s) would be left alone.", self.uncategorized));
        }
        if self.unlocated > 0 {
            lines.push(format!("{} error(s) have no file location.", self.unlocated));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Plan one iteration without running any agent.
pub async fn execute(ctx: &AppContext, json_mode: bool) -> Result<i32> {
    let store = ctx.open_store().await?;
    let convergence = ctx.convergence_loop(store, StopSignal::new())?;

    let simulation = convergence.simulate().await?;
    output(&SimulateOutput::from(&simulation), json_mode);
    Ok(0)
}
