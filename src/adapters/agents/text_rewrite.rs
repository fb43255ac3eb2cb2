//! Regex search-and-replace agent.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ErrorRecord, FixReport, RewriteScope};
use crate::domain::ports::{errors_by_file, FileGrant, FixAgent};

use super::source::SourceFile;

/// Rewrites the offending line (or whole file) with a regex replacement.
///
/// `replace` may reference capture groups (`$1`, `${name}`). An error counts
/// as resolved when the rewrite changed its line, so several errors on one
/// line are all credited by a single rewrite. In file scope, every error in a
/// changed file counts.
#[derive(Debug, Clone)]
pub struct TextRewriteAgent {
    find: Regex,
    replace: String,
    scope: RewriteScope,
}

impl TextRewriteAgent {
    /// Fails if `find` is not a valid regex.
    pub fn new(find: &str, replace: impl Into<String>, scope: RewriteScope) -> Result<Self, regex::Error> {
        Ok(Self {
            find: Regex::new(find)?,
            replace: replace.into(),
            scope,
        })
    }

    fn rewrite(&self, text: &str) -> String {
        self.find.replace_all(text, self.replace.as_str()).into_owned()
    }
}

#[async_trait]
impl FixAgent for TextRewriteAgent {
    fn name(&self) -> &str {
        "text_rewrite"
    }

    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport> {
        let mut report = FixReport::default();

        for (path, file_errors) in errors_by_file(errors) {
            if grant.stop_requested() {
                break;
            }

            let original = grant.read(path).await?;
            let updated = match self.scope {
                RewriteScope::File => {
                    let updated = self.rewrite(&original);
                    if updated != original {
                        report.resolve(file_errors.len());
                    }
                    updated
                }
                RewriteScope::Line => {
                    let mut targets: BTreeMap<u32, usize> = BTreeMap::new();
                    for error in &file_errors {
                        if let Some(line) = error.line {
                            *targets.entry(line).or_default() += 1;
                        }
                    }

                    let mut source = SourceFile::parse(&original);
                    for (&number, &count) in &targets {
                        let Some(current) = source.line(number) else { continue };
                        let rewritten = self.rewrite(current);
                        if source.set_line(number, rewritten) {
                            report.resolve(count);
                        }
                    }
                    source.render()
                }
            };

            if updated != original {
                grant.write(path, updated).await?;
                report.touch(grant.resolve(path));
            }
        }

        tracing::debug!(
            agent = self.name(),
            resolved = report.resolved,
            files = report.files_touched.len(),
            "Text rewrite finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StopSignal;

    #[tokio::test]
    async fn rewrites_only_the_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Svc.cs");
        std::fs::write(
            &file,
            "public async Task Run() { Work(); }\npublic async Task Keep() { await X(); }\n",
        )
        .unwrap();

        let agent = TextRewriteAgent::new(r"\basync Task\b", "Task", RewriteScope::Line).unwrap();
        let grant = FileGrant::new("t", dir.path(), vec![file.clone()], StopSignal::new());
        let errors = vec![ErrorRecord::new(file.clone(), "lacks await").with_line(1)];

        let report = agent.fix(&errors, &grant).await.unwrap();

        assert_eq!(report.resolved, 1);
        assert!(report.files_touched.contains(&file));
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "public Task Run() { Work(); }\npublic async Task Keep() { await X(); }\n"
        );
    }

    #[tokio::test]
    async fn every_error_on_a_rewritten_line_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Svc.cs");
        std::fs::write(&file, "async Task A() {} async Task B() {}\nasync Task C() { await D(); }\n").unwrap();

        let agent = TextRewriteAgent::new(r"\basync\s+", "", RewriteScope::Line).unwrap();
        let grant = FileGrant::new("t", dir.path(), vec![file.clone()], StopSignal::new());
        let errors = vec![
            ErrorRecord::new(file.clone(), "A lacks await").with_line(1),
            ErrorRecord::new(file.clone(), "B lacks await").with_line(1),
        ];

        let report = agent.fix(&errors, &grant).await.unwrap();

        assert_eq!(report.resolved, 2);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "Task A() {} Task B() {}\nasync Task C() { await D(); }\n"
        );
    }

    #[tokio::test]
    async fn unchanged_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.cs");
        std::fs::write(&file, "nothing to see\n").unwrap();

        let agent = TextRewriteAgent::new("absent", "x", RewriteScope::File).unwrap();
        let grant = FileGrant::new("t", dir.path(), vec![file.clone()], StopSignal::new());
        let errors = vec![ErrorRecord::new(file, "e").with_line(1)];

        let report = agent.fix(&errors, &grant).await.unwrap();
        assert_eq!(report.resolved, 0);
        assert!(report.files_touched.is_empty());
    }

    #[tokio::test]
    async fn ungranted_file_fails_the_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.cs");
        std::fs::write(&file, "x\n").unwrap();

        let agent = TextRewriteAgent::new("x", "y", RewriteScope::File).unwrap();
        let grant = FileGrant::new("t", dir.path(), Vec::new(), StopSignal::new());
        let errors = vec![ErrorRecord::new(file, "e")];

        assert!(agent.fix(&errors, &grant).await.is_err());
    }
}
