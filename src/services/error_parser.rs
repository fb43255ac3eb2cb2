//! Build output parser.
//!
//! Turns the raw text a compiler prints into [`ErrorRecord`]s. Three line
//! shapes are recognised:
//!
//! - MSBuild / csc: `path(line,col): error CODE: message [project]`, with an
//!   optional `N>` node prefix from parallel builds
//! - GCC / Clang style: `path:line:col: error: message`
//! - rustc style: an `error[CODE]: message` header followed a few lines later
//!   by `--> path:line:col`
//!
//! Anything else is skipped. Garbled lines never fail the parse.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::domain::models::ErrorRecord;
use crate::domain::ports::BuildOutput;

/// How many lines after an `error[..]` header a `-->` location may appear.
const DEFAULT_LOCATION_LOOKAHEAD: usize = 6;

// ---------------------------------------------------------------------------
// ParsedBuild / ParseOutcome
// ---------------------------------------------------------------------------

/// Errors extracted from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBuild {
    /// Deduplicated errors with a file location, in first-seen order.
    pub records: Vec<ErrorRecord>,
    /// Errors the tool printed without any file location.
    pub unlocated: Vec<String>,
    /// Total printed by the tool's own summary line, if any.
    pub reported_total: Option<usize>,
}

impl ParsedBuild {
    /// Error count used for convergence decisions.
    pub fn error_count(&self) -> usize {
        self.records.len() + self.unlocated.len()
    }

    /// Whether the build reported no errors at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.unlocated.is_empty()
    }
}

/// What one build told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The build succeeded with no errors.
    Clean,
    /// The build reported errors.
    Errors(ParsedBuild),
    /// The output cannot be trusted: the tool crashed, was killed, or
    /// reported failure without any parseable error.
    ToolFailure(String),
}

impl ParseOutcome {
    /// Error count, or `None` for a tool failure.
    pub fn error_count(&self) -> Option<usize> {
        match self {
            Self::Clean => Some(0),
            Self::Errors(parsed) => Some(parsed.error_count()),
            Self::ToolFailure(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorParser
// ---------------------------------------------------------------------------

/// Stateless parser for compiler diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorParser {
    location_lookahead: usize,
}

impl Default for ErrorParser {
    fn default() -> Self {
        Self {
            location_lookahead: DEFAULT_LOCATION_LOOKAHEAD,
        }
    }
}

/// An `error...:` header still waiting for its `-->` location.
struct PendingHeader {
    code: Option<String>,
    message: String,
    lines_left: usize,
}

impl PendingHeader {
    fn describe(self) -> String {
        unlocated_message(self.code.as_deref(), self.message)
    }
}

/// One recognised `<location>: error...` line.
enum Diagnostic {
    Located(ErrorRecord),
    /// The location part names a tool rather than a source position.
    Unlocated(String),
}

impl ErrorParser {
    /// A parser with the built-in rustc and MSBuild patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a build result as clean, failing with errors, or unusable.
    pub fn parse(&self, output: &BuildOutput) -> ParseOutcome {
        let Some(exit_code) = output.exit_code else {
            return ParseOutcome::ToolFailure(
                "build process terminated without an exit code".to_string(),
            );
        };

        let parsed = self.parse_text(&output.combined());

        if !parsed.is_empty() {
            tracing::debug!(
                located = parsed.records.len(),
                unlocated = parsed.unlocated.len(),
                reported_total = ?parsed.reported_total,
                "Parsed build output"
            );
            return ParseOutcome::Errors(parsed);
        }

        let reported = parsed.reported_total.unwrap_or(0);
        if exit_code == 0 && reported == 0 {
            ParseOutcome::Clean
        } else if reported > 0 {
            ParseOutcome::ToolFailure(format!(
                "build reported {reported} errors but none could be parsed"
            ))
        } else if output.is_silent() {
            ParseOutcome::ToolFailure(format!(
                "build exited with code {exit_code} and printed nothing"
            ))
        } else {
            ParseOutcome::ToolFailure(format!(
                "build exited with code {exit_code} but no errors could be parsed"
            ))
        }
    }

    /// Extract errors from raw text without judging the exit code.
    pub fn parse_text(&self, text: &str) -> ParsedBuild {
        let mut parsed = ParsedBuild::default();
        let mut seen: HashSet<(PathBuf, Option<u32>, String)> = HashSet::new();
        let mut seen_unlocated: HashSet<String> = HashSet::new();
        let mut pending: Option<PendingHeader> = None;

        for raw in text.lines() {
            let line = strip_node_prefix(raw.trim());
            if line.is_empty() {
                continue;
            }

            if let Some(total) = summary_total(line) {
                parsed.reported_total = Some(parsed.reported_total.unwrap_or(0).max(total));
                continue;
            }

            if let Some(location) = line.strip_prefix("--> ") {
                if let Some(header) = pending.take() {
                    match parse_colon_location(location.trim()) {
                        Some((file, line_no, column)) => {
                            let mut record = ErrorRecord::new(file, header.message);
                            record.line = line_no;
                            record.column = column;
                            record.code = header.code;
                            push_record(&mut parsed, &mut seen, record);
                        }
                        None => push_unlocated(&mut parsed, &mut seen_unlocated, header.describe()),
                    }
                }
                continue;
            }

            if let Some((code, message)) = parse_bare_header(line) {
                if let Some(previous) = pending.take() {
                    push_unlocated(&mut parsed, &mut seen_unlocated, previous.describe());
                }
                pending = Some(PendingHeader {
                    code,
                    message,
                    lines_left: self.location_lookahead,
                });
                continue;
            }

            match parse_located(line) {
                Some(Diagnostic::Located(record)) => {
                    push_record(&mut parsed, &mut seen, record);
                    continue;
                }
                Some(Diagnostic::Unlocated(message)) => {
                    push_unlocated(&mut parsed, &mut seen_unlocated, message);
                    continue;
                }
                None => {}
            }

            // A new non-error diagnostic owns the next `-->` line.
            if starts_other_diagnostic(line) {
                if let Some(header) = pending.take() {
                    push_unlocated(&mut parsed, &mut seen_unlocated, header.describe());
                }
                continue;
            }

            if let Some(header) = pending.as_mut() {
                header.lines_left = header.lines_left.saturating_sub(1);
                if header.lines_left == 0 {
                    if let Some(expired) = pending.take() {
                        push_unlocated(&mut parsed, &mut seen_unlocated, expired.describe());
                    }
                }
            }
        }

        if let Some(header) = pending {
            push_unlocated(&mut parsed, &mut seen_unlocated, header.describe());
        }

        parsed
    }
}

fn push_record(
    parsed: &mut ParsedBuild,
    seen: &mut HashSet<(PathBuf, Option<u32>, String)>,
    record: ErrorRecord,
) {
    if seen.insert((record.file.clone(), record.line, record.message.clone())) {
        parsed.records.push(record);
    }
}

fn push_unlocated(parsed: &mut ParsedBuild, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        parsed.unlocated.push(message);
    }
}

// ---------------------------------------------------------------------------
// Line shapes
// ---------------------------------------------------------------------------

/// Drop the `12>` prefix MSBuild adds when building projects in parallel.
fn strip_node_prefix(line: &str) -> &str {
    match line.split_once('>') {
        Some((node, rest)) if !node.is_empty() && node.bytes().all(|b| b.is_ascii_digit()) => {
            rest.trim_start()
        }
        _ => line,
    }
}

/// Drop the trailing ` [path/to/Project.csproj]` MSBuild appends.
fn strip_project_suffix(message: &str) -> &str {
    let trimmed = message.trim_end();
    if trimmed.ends_with(']') {
        if let Some(start) = trimmed.rfind(" [") {
            return trimmed[..start].trim_end();
        }
    }
    trimmed
}

/// Recognise tool summary lines and return the error total they state.
fn summary_total(line: &str) -> Option<usize> {
    // MSBuild: "    3 Error(s)"
    if let Some(count) = line.strip_suffix(" Error(s)") {
        return count.trim().parse().ok();
    }
    // rustc: "error: aborting due to 2 previous errors"
    if let Some(rest) = line.strip_prefix("error: aborting due to ") {
        let count = rest.split_whitespace().next()?;
        return Some(count.parse().unwrap_or(1));
    }
    // cargo: "error: could not compile `x` (lib) due to 2 previous errors"
    if line.starts_with("error: could not compile") {
        return line
            .split_whitespace()
            .skip_while(|word| *word != "to")
            .nth(1)
            .and_then(|word| word.parse().ok())
            .or(Some(0));
    }
    // clang: "3 errors generated."
    let mut words = line.split_whitespace();
    let count = words.next()?.parse().ok()?;
    match (words.next(), words.next()) {
        (Some("error" | "errors"), Some("generated.")) => Some(count),
        _ => None,
    }
}

/// Split `error CODE: message`, `error[CODE]: message` or `error: message`
/// (the text after the severity marker) into code and message.
fn split_error_body(body: &str) -> Option<(Option<String>, String)> {
    let rest = body.strip_prefix("error")?;
    let (code, message) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (code, message) = bracketed.split_once("]:")?;
        (Some(code.trim()), message)
    } else if let Some(message) = rest.strip_prefix(':') {
        (None, message)
    } else if rest.starts_with(' ') {
        let (code, message) = rest.trim_start().split_once(':')?;
        if code.is_empty() || code.contains(char::is_whitespace) {
            return None;
        }
        (Some(code), message)
    } else {
        return None;
    };

    let message = strip_project_suffix(message.trim());
    if message.is_empty() {
        return None;
    }
    Some((code.map(str::to_string), message.to_string()))
}

/// A line that starts with `error` and carries no location of its own.
fn parse_bare_header(line: &str) -> Option<(Option<String>, String)> {
    if !line.starts_with("error") {
        return None;
    }
    split_error_body(line)
}

/// `warning: ...`, `warning[CODE]: ...` or `note: ...` at the start of a line.
fn starts_other_diagnostic(line: &str) -> bool {
    ["warning:", "warning[", "note:"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

fn unlocated_message(code: Option<&str>, message: String) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message,
    }
}

/// A line of the form `<location>: error...`.
fn parse_located(line: &str) -> Option<Diagnostic> {
    let (location, body) = line
        .split_once(": error")
        .map(|(loc, rest)| (loc, format!("error{rest}")))
        .or_else(|| {
            line.split_once(": fatal error")
                .map(|(loc, rest)| (loc, format!("error{rest}")))
        })?;

    let (code, message) = split_error_body(&body)?;
    let (file, line_no, column) = if location.ends_with(')') {
        parse_paren_location(location)?
    } else {
        parse_colon_location(location)?
    };

    if line_no.is_none() {
        return Some(Diagnostic::Unlocated(unlocated_message(code.as_deref(), message)));
    }

    let mut record = ErrorRecord::new(file, message);
    record.line = line_no;
    record.column = column;
    record.code = code;
    Some(Diagnostic::Located(record))
}

/// `path(line,col)` or `path(line)`.
fn parse_paren_location(location: &str) -> Option<(PathBuf, Option<u32>, Option<u32>)> {
    let open = location.rfind('(')?;
    let path = location[..open].trim();
    let inner = &location[open + 1..location.len() - 1];
    let mut numbers = inner.split(',').map(|n| n.trim().parse::<u32>());
    let line = numbers.next()?.ok()?;
    let column = numbers.next().and_then(Result::ok);
    if path.is_empty() {
        return None;
    }
    Some((normalize_path(path), Some(line), column))
}

/// `path:line:col`, `path:line` or a bare path.
fn parse_colon_location(location: &str) -> Option<(PathBuf, Option<u32>, Option<u32>)> {
    let mut numbers = Vec::with_capacity(2);
    let mut path = location;
    while numbers.len() < 2 {
        match path.rsplit_once(':') {
            Some((head, tail)) => match tail.trim().parse::<u32>() {
                Ok(n) => {
                    numbers.push(n);
                    path = head;
                }
                Err(_) => break,
            },
            None => break,
        }
    }
    let path = path.trim();
    if path.is_empty() || (path.contains(char::is_whitespace) && !path.contains(['/', '\\'])) {
        return None;
    }
    numbers.reverse();
    Some((
        normalize_path(path),
        numbers.first().copied(),
        numbers.get(1).copied(),
    ))
}

fn normalize_path(path: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path)
    } else {
        PathBuf::from(path.replace('\\', "/"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str) -> BuildOutput {
        BuildOutput::new(Some(1), stdout, "")
    }

    fn errors(outcome: ParseOutcome) -> ParsedBuild {
        match outcome {
            ParseOutcome::Errors(parsed) => parsed,
            other => panic!("expected errors, got {other:?}"),
        }
    }

    #[test]
    fn parses_msbuild_lines() {
        let out = failed(
            "1>src/Models/Foo.cs(12,5): error CS0535: 'Foo' does not implement interface member 'IBar.Baz()' [/w/Lib.csproj]\n\
             src/Models/Foo.cs(3,1): warning CS8618: nullable [/w/Lib.csproj]\n",
        );
        let parsed = errors(ErrorParser::new().parse(&out));

        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.file, PathBuf::from("src/Models/Foo.cs"));
        assert_eq!(record.line, Some(12));
        assert_eq!(record.column, Some(5));
        assert_eq!(record.code.as_deref(), Some("CS0535"));
        assert_eq!(
            record.message,
            "'Foo' does not implement interface member 'IBar.Baz()'"
        );
    }

    #[test]
    fn deduplicates_msbuild_summary_block() {
        let line = "A.cs(1,1): error CS0101: duplicate [/w/P.csproj]";
        let out = failed(&format!("{line}\n\nBuild FAILED.\n\n{line}\n    1 Error(s)\n"));
        let parsed = errors(ErrorParser::new().parse(&out));

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.reported_total, Some(1));
        assert_eq!(parsed.error_count(), 1);
    }

    #[test]
    fn parses_gcc_style() {
        let out = failed("src/main.c:10:3: error: expected ';' before '}' token\nsrc/main.c:2:1: warning: unused\n");
        let parsed = errors(ErrorParser::new().parse(&out));

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].file, PathBuf::from("src/main.c"));
        assert_eq!(parsed.records[0].line, Some(10));
        assert_eq!(parsed.records[0].column, Some(3));
        assert_eq!(parsed.records[0].code, None);
    }

    #[test]
    fn parses_rustc_multiline() {
        let stderr = r#"error[E0308]: mismatched types
  --> src/main.rs:5:14
   |
5  |     let x: i32 = "hello";
   |                  ^^^^^^^ expected `i32`, found `&str`

error: aborting due to 1 previous error"#;
        let parsed = errors(ErrorParser::new().parse(&BuildOutput::new(Some(101), "", stderr)));

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].code.as_deref(), Some("E0308"));
        assert_eq!(parsed.records[0].file, PathBuf::from("src/main.rs"));
        assert_eq!(parsed.records[0].line, Some(5));
        assert_eq!(parsed.reported_total, Some(1));
    }

    #[test]
    fn warning_block_location_is_not_borrowed_by_pending_error() {
        let stderr = "error: linking with `cc` failed\n\
                      warning: unused variable: `x`\n\
                      \x20 --> src/lib.rs:3:9\n\
                      error: aborting due to 1 previous error\n";
        let parsed = errors(ErrorParser::new().parse(&BuildOutput::new(Some(101), "", stderr)));

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.unlocated, vec!["linking with `cc` failed".to_string()]);
    }

    #[test]
    fn location_less_errors_are_unlocated() {
        let out = failed("MSBUILD : error MSB1009: Project file does not exist.\nerror: linker `cc` not found\n");
        let parsed = errors(ErrorParser::new().parse(&out));

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.unlocated.len(), 2);
        assert_eq!(parsed.error_count(), 2);
    }

    #[test]
    fn garbled_lines_are_skipped() {
        let out = failed("(((: error\n: error CS:\nA.cs(x,y): error CS1: bad\nB.cs(2,1): error CS2: ok\n");
        let parsed = errors(ErrorParser::new().parse(&out));
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].file, PathBuf::from("B.cs"));
    }

    #[test]
    fn clean_build() {
        let out = BuildOutput::new(Some(0), "Build succeeded.\n    0 Warning(s)\n    0 Error(s)\n", "");
        assert_eq!(ErrorParser::new().parse(&out), ParseOutcome::Clean);
    }

    #[test]
    fn silent_failure_is_tool_failure() {
        let out = BuildOutput::new(Some(1), "", "");
        assert!(matches!(
            ErrorParser::new().parse(&out),
            ParseOutcome::ToolFailure(_)
        ));
    }

    #[test]
    fn killed_process_is_tool_failure() {
        let out = BuildOutput::new(None, "A.cs(1,1): error CS1: x", "");
        assert!(matches!(
            ErrorParser::new().parse(&out),
            ParseOutcome::ToolFailure(_)
        ));
    }

    #[test]
    fn reported_errors_without_records_is_tool_failure() {
        let out = BuildOutput::new(Some(0), "    4 Error(s)\n", "");
        let outcome = ErrorParser::new().parse(&out);
        assert!(matches!(outcome, ParseOutcome::ToolFailure(ref reason) if reason.contains('4')));
        assert_eq!(outcome.error_count(), None);
    }

    #[test]
    fn windows_paths_are_normalised() {
        let out = failed("C:\\src\\Lib\\A.cs(7,2): error CS0246: type not found");
        let parsed = errors(ErrorParser::new().parse(&out));
        if cfg!(windows) {
            assert_eq!(parsed.records[0].file, PathBuf::from("C:\\src\\Lib\\A.cs"));
        } else {
            assert_eq!(parsed.records[0].file, PathBuf::from("C:/src/Lib/A.cs"));
        }
    }
}
