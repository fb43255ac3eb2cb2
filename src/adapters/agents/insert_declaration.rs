//! Missing declaration insertion.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ErrorRecord, FixReport};
use crate::domain::ports::{errors_by_file, FileGrant, FixAgent};

use super::source::SourceFile;

/// Inserts a declaration line such as a missing `using` directive.
///
/// With a `message_pattern`, the line is a template expanded from the
/// pattern's captures (`$1`, `${name}`) and errors whose message does not
/// match are left alone. The line goes after the last line matching
/// `anchor`, or at the top of the file. A declaration already present counts
/// as resolved without touching the file.
#[derive(Debug, Clone)]
pub struct InsertDeclarationAgent {
    template: String,
    message_pattern: Option<Regex>,
    anchor: Option<Regex>,
}

impl InsertDeclarationAgent {
    /// Fails if either pattern is not a valid regex.
    pub fn new(
        template: impl Into<String>,
        message_pattern: Option<&str>,
        anchor: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            template: template.into(),
            message_pattern: message_pattern.map(Regex::new).transpose()?,
            anchor: anchor.map(Regex::new).transpose()?,
        })
    }

    /// The declaration this error asks for, if the agent handles it.
    fn declaration_for(&self, error: &ErrorRecord) -> Option<String> {
        match &self.message_pattern {
            None => Some(self.template.clone()),
            Some(pattern) => {
                let captures = pattern.captures(&error.message)?;
                let mut line = String::new();
                captures.expand(&self.template, &mut line);
                Some(line)
            }
        }
    }

    fn insertion_index(&self, source: &SourceFile) -> usize {
        self.anchor.as_ref().map_or(0, |anchor| {
            source
                .lines()
                .enumerate()
                .filter(|(_, line)| anchor.is_match(line))
                .last()
                .map_or(0, |(index, _)| index + 1)
        })
    }
}

#[async_trait]
impl FixAgent for InsertDeclarationAgent {
    fn name(&self) -> &str {
        "insert_declaration"
    }

    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport> {
        let mut report = FixReport::default();

        for (path, file_errors) in errors_by_file(errors) {
            if grant.stop_requested() {
                break;
            }

            // declaration -> number of errors it answers
            let mut wanted: BTreeMap<String, usize> = BTreeMap::new();
            for error in &file_errors {
                if let Some(declaration) = self.declaration_for(error) {
                    *wanted.entry(declaration).or_default() += 1;
                }
            }
            if wanted.is_empty() {
                continue;
            }

            let original = grant.read(path).await?;
            let mut source = SourceFile::parse(&original);

            for (declaration, count) in wanted {
                let present = source
                    .lines()
                    .any(|line| line.trim() == declaration.trim());
                if !present {
                    let index = self.insertion_index(&source);
                    source.insert_line(index, declaration);
                }
                report.resolve(count);
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
