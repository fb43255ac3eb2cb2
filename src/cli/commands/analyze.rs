//! Implementation of the `buildfix analyze` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, section_header, truncate, CommandOutput};
use crate::domain::models::StopSignal;
use crate::services::Measurement;

/// Errors of one category.
#[derive(Debug, Serialize)]
pub struct CategoryCount {
    /// Category id, or `uncategorized`.
    pub category: String,
    /// Errors in that category.
    pub errors: usize,
}

/// Result of `analyze`.
#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    /// Errors the build reported.
    pub error_count: usize,
    /// Categories in configured order, uncategorized last.
    pub categories: Vec<CategoryCount>,
    /// Messages of errors without a file location.
    pub unlocated: Vec<String>,
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        if self.error_count == 0 {
            return "Build is clean.".to_string();
        }

        let mut table = list_table(&["category", "errors"]);
        for row in &self.categories {
            table.add_row(vec![row.category.clone(), row.errors.to_string()]);
        }
        let mut lines = vec![format!("{} error(s):", self.error_count), table.to_string()];

        if !self.unlocated.is_empty() {
            lines.push(section_header("Errors without a file location"));
            for message in &self.unlocated {
                lines.push(format!("  - {}", truncate(message, 120)));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Build once and report errors per category.
pub async fn execute(ctx: &AppContext, json_mode: bool) -> Result<i32> {
    let store = ctx.open_store().await?;
    let convergence = ctx.convergence_loop(store, StopSignal::new())?;

    let measurement = convergence.measure().await;
    let Some(error_count) = measurement.error_count() else {
        let reason = match measurement {
            Measurement::ToolFailure(reason) => reason,
            Measurement::Measured { .. } => String::new(),
        };
        anyhow::bail!("Build could not be analyzed: {reason}");
    };

    let mut categories: Vec<CategoryCount> = measurement
        .category_counts()
        .into_iter()
        .map(|(id, errors)| CategoryCount {
            category: id.to_string(),
            errors,
        })
        .collect();
    categories.sort_by(|a, b| b.errors.cmp(&a.errors).then_with(|| a.category.cmp(&b.category)));

    output(
        &AnalyzeOutput {
            error_count,
            categories,
            unlocated: measurement.unlocated().to_vec(),
        },
        json_mode,
    );
    Ok(0)
}
