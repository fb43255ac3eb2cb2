//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::{style, StyledObject};
use serde::Serialize;

/// A command result that renders as text or JSON.
pub trait CommandOutput: Serialize {
    /// Text shown without `--json`.
    fn to_human(&self) -> String;
    /// Document printed with `--json`.
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` in the selected mode.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if
/// truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Create a borderless table with upper-cased headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Colour a run status or agent outcome label. `console` drops the styling
/// when stdout is not a terminal or `NO_COLOR` is set.
pub fn colorize_status(status: &str) -> StyledObject<&str> {
    match status {
        "converged" | "success" => style(status).green().bold(),
        "running" | "partial" => style(status).yellow(),
        "exhausted" | "stalled" => style(status).magenta(),
        "failed" => style(status).red().bold(),
        "skipped" => style(status).dim(),
        _ => style(status),
    }
}

/// Section header for detail views.
pub fn section_header(title: &str) -> String {
    format!("\n{}", style(title).bold().underlined())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ÄÖÜÄÖÜÄÖÜ", 6), "ÄÖÜ...");
    }

    #[test]
    fn table_has_headers() {
        let mut table = list_table(&["category", "errors"]);
        table.add_row(vec!["dupes", "3"]);
        let rendered = table.to_string();
        assert!(rendered.contains("CATEGORY"));
        assert!(rendered.contains("dupes"));
    }
}
