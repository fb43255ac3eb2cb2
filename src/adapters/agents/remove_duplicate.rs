//! Redundant declaration removal.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ErrorRecord, FixReport};
use crate::domain::ports::{errors_by_file, FileGrant, FixAgent};

use super::source::SourceFile;

/// Deletes the reported line when the same non-empty line already appears
/// earlier in the file (duplicate `using` directives, repeated members).
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveDuplicateAgent;

impl RemoveDuplicateAgent {
    /// The agent is stateless.
    pub const fn new() -> Self {
        Self
    }

    fn is_repeated(source: &SourceFile, number: u32) -> bool {
        let Some(target) = source.line(number).map(str::trim) else {
            return false;
        };
        if target.is_empty() {
            return false;
        }
        let earlier = usize::try_from(number.saturating_sub(1)).unwrap_or(0);
        source.lines().take(earlier).any(|line| line.trim() == target)
    }
}

#[async_trait]
impl FixAgent for RemoveDuplicateAgent {
    fn name(&self) -> &str {
        "remove_duplicate"
    }

    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport> {
        let mut report = FixReport::default();

        for (path, file_errors) in errors_by_file(errors) {
            if grant.stop_requested() {
                break;
            }

            // line -> number of errors reported on it
            let mut targets: BTreeMap<u32, usize> = BTreeMap::new();
            for error in &file_errors {
                if let Some(line) = error.line {
                    *targets.entry(line).or_default() += 1;
                }
            }
            if targets.is_empty() {
                continue;
            }

            let original = grant.read(path).await?;
            let mut source = SourceFile::parse(&original);

            // Bottom-up so earlier line numbers stay valid.
            for (&line, &count) in targets.iter().rev() {
                if Self::is_repeated(&source, line) && source.remove_line(line).is_some() {
                    report.resolve(count);
                }
            }

            let updated = source.render();
            if updated != original {
                grant.write(path, updated).await?;
                report.touch(grant.resolve(path));
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StopSignal;

    #[tokio::test]
    async fn removes_repeated_using_directives() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.cs");
        std::fs::write(
            &file,
            "using System;\nusing System.Linq;\nusing System;\n\nclass A {}\nusing System.Linq;\n",
        )
        .unwrap();

        let grant = FileGrant::new("d", dir.path(), vec![file.clone()], StopSignal::new());
        let errors = vec![
            ErrorRecord::new(file.clone(), "CS0105 duplicate").with_line(3),
            ErrorRecord::new(file.clone(), "CS0105 duplicate").with_line(6),
        ];

        let report = RemoveDuplicateAgent::new().fix(&errors, &grant).await.unwrap();

        assert_eq!(report.resolved, 2);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "using System;\nusing System.Linq;\n\nclass A {}\n"
        );
    }

    #[tokio::test]
    async fn keeps_first_occurrence_and_unique_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("B.cs");
        std::fs::write(&file, "int x;\nint y;\n").unwrap();

        let grant = FileGrant::new("d", dir.path(), vec![file.clone()], StopSignal::new());
        let errors = vec![
            ErrorRecord::new(file.clone(), "dup").with_line(1),
            ErrorRecord::new(file.clone(), "dup").with_line(2),
        ];

        let report = RemoveDuplicateAgent::new().fix(&errors, &grant).await.unwrap();
        assert_eq!(report.resolved, 0);
        assert!(report.files_touched.is_empty());
    }
}
