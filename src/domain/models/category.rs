//! Category configuration: ordered match rules plus the bound agent variant.
//!
//! Categories are read once at startup and stay immutable for the run. Their
//! order is significant: the classifier evaluates categories top to bottom
//! and the first matching rule wins, so moving a category up or down changes
//! which bucket an error that matches several categories lands in.

use serde::{Deserialize, Serialize};

use super::error_record::CategoryId;

// ---------------------------------------------------------------------------
// Match rules
// ---------------------------------------------------------------------------

/// Which part of an error record a regex rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    /// The message text.
    #[default]
    Message,
    /// The tool-assigned error code.
    Code,
    /// Either the message or the code.
    Any,
}

/// A single predicate over an error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchRule {
    /// Exact tool code, compared case-insensitively (`CS0535`).
    Code {
        /// Code to match.
        value: String,
    },
    /// Tool code prefix (`CS01`).
    CodePrefix {
        /// Leading characters of the code.
        value: String,
    },
    /// Substring of the raw message.
    MessageContains {
        /// Text to look for.
        text: String,
        /// Compare without regard to case.
        #[serde(default)]
        ignore_case: bool,
    },
    /// Regular expression against the chosen field.
    Regex {
        /// Regex source.
        pattern: String,
        /// Record field the regex is applied to.
        #[serde(default)]
        field: MatchField,
    },
}

// ---------------------------------------------------------------------------
// Agent variants
// ---------------------------------------------------------------------------

/// Where a text rewrite applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteScope {
    /// Only the line the error points at.
    #[default]
    Line,
    /// The whole file.
    File,
}

/// Built-in fix agent variant bound to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentSpec {
    /// Regex search-and-replace.
    TextRewrite {
        /// Regex to search for.
        find: String,
        /// Replacement, may reference capture groups.
        replace: String,
        /// Whether only the error line or the whole file is rewritten.
        #[serde(default)]
        scope: RewriteScope,
    },
    /// External formatter or codegen tool run once per granted file.
    Formatter {
        /// Executable to run.
        program: String,
        /// Arguments placed before the file path.
        #[serde(default)]
        args: Vec<String>,
        /// Per-file limit in seconds.
        #[serde(default = "default_formatter_timeout_secs")]
        timeout_secs: u64,
    },
    /// Delete a line that repeats an earlier line of the same file.
    RemoveDuplicate,
    /// Insert a declaration line (e.g. a missing `using`) if absent.
    InsertDeclaration {
        /// Line to insert; `$1`/`${name}` expand captures of `message_pattern`.
        text: String,
        /// Regex run against the error message to capture names for `text`.
        #[serde(default)]
        message_pattern: Option<String>,
        /// Insert after the last line matching this pattern, else at the top.
        #[serde(default)]
        anchor: Option<String>,
    },
}

const fn default_formatter_timeout_secs() -> u64 {
    120
}

impl AgentSpec {
    /// Short name of the variant, used in logs and reports.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TextRewrite { .. } => "text_rewrite",
            Self::Formatter { .. } => "formatter",
            Self::RemoveDuplicate => "remove_duplicate",
            Self::InsertDeclaration { .. } => "insert_declaration",
        }
    }
}

// ---------------------------------------------------------------------------
// CategoryConfig
// ---------------------------------------------------------------------------

/// One entry of the ordered category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Unique category id, also the agent binding key.
    pub id: CategoryId,
    /// Free-text note shown in reports.
    #[serde(default)]
    pub description: Option<String>,
    /// Any matching rule claims the error.
    pub rules: Vec<MatchRule>,
    /// Built-in agent that repairs this category.
    pub agent: AgentSpec,
}
