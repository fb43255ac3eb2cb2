//! Structured build errors and the category tags the classifier assigns.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reserved tag for errors that match no configured rule.
pub const UNCATEGORIZED: &str = "uncategorized";

// ---------------------------------------------------------------------------
// CategoryId
// ---------------------------------------------------------------------------

/// Identifier of an error category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// Wrap a configured category id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved "uncategorized" tag.
    pub fn uncategorized() -> Self {
        Self(UNCATEGORIZED.to_string())
    }

    /// Whether this is the reserved `uncategorized` tag.
    pub fn is_uncategorized(&self) -> bool {
        self.0 == UNCATEGORIZED
    }

    /// The id as configured.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// ErrorRecord
// ---------------------------------------------------------------------------

/// One compiler error, as reported by the build tool.
///
/// Records are produced fresh from every build and never mutated; the
/// classifier hands back a tagged copy via [`ErrorRecord::classified`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Path of the offending file, as printed by the tool.
    pub file: PathBuf,
    /// 1-based line number, when the tool reports one.
    pub line: Option<u32>,
    /// 1-based column, when the tool reports one.
    pub column: Option<u32>,
    /// Tool-assigned code such as `CS0535` or `E0308`.
    pub code: Option<String>,
    /// Raw message text with location and code stripped.
    pub message: String,
    /// Category tag, `uncategorized` until the classifier has run.
    pub category: CategoryId,
}

impl ErrorRecord {
    /// A record with only a file and a message.
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            code: None,
            message: message.into(),
            category: CategoryId::uncategorized(),
        }
    }

    /// Set the 1-based line number.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Set the 1-based column.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Set the tool-assigned error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Return a copy tagged with `category`.
    pub fn classified(self, category: CategoryId) -> Self {
        Self { category, ..self }
    }

    /// Identity used for deduplication within one parse.
    pub fn key(&self) -> ErrorKey<'_> {
        ErrorKey {
            file: &self.file,
            line: self.line,
            message: &self.message,
        }
    }

    /// The `file(line)` location string used in reports.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}({})", self.file.display(), line),
            None => self.file.display().to_string(),
        }
    }
}

/// The `(file, line, message)` triple errors are deduplicated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorKey<'a> {
    /// Offending file.
    pub file: &'a Path,
    /// Line number, if any.
    pub line: Option<u32>,
    /// Message text.
    pub message: &'a str,
}
