//! Rule-table classifier.
//!
//! Categories are compiled once into a flat, ordered table of predicates.
//! Classification walks the table top to bottom and the first predicate that
//! matches decides the category, so the configured category order is the
//! only tie-break between overlapping rules. Nothing here holds mutable
//! state: the same record and table always produce the same tag.

use regex::{Regex, RegexBuilder};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CategoryConfig, CategoryId, ErrorRecord, MatchField, MatchRule};

/// A match rule with its regex compiled.
#[derive(Debug, Clone)]
enum CompiledRule {
    Code(String),
    CodePrefix(String),
    MessageContains { needle: String, ignore_case: bool },
    Regex { regex: Regex, field: MatchField },
}

impl CompiledRule {
    fn compile(category: &CategoryId, rule: &MatchRule) -> DomainResult<Self> {
        let invalid = |reason: String| DomainError::InvalidRule {
            category: category.to_string(),
            reason,
        };

        match rule {
            MatchRule::Code { value } if value.trim().is_empty() => {
                Err(invalid("empty code".to_string()))
            }
            MatchRule::Code { value } => Ok(Self::Code(value.trim().to_ascii_uppercase())),
            MatchRule::CodePrefix { value } if value.trim().is_empty() => {
                Err(invalid("empty code prefix".to_string()))
            }
            MatchRule::CodePrefix { value } => {
                Ok(Self::CodePrefix(value.trim().to_ascii_uppercase()))
            }
            MatchRule::MessageContains { text, .. } if text.is_empty() => {
                Err(invalid("empty message_contains text".to_string()))
            }
            MatchRule::MessageContains { text, ignore_case } => Ok(Self::MessageContains {
                needle: if *ignore_case {
                    text.to_lowercase()
                } else {
                    text.clone()
                },
                ignore_case: *ignore_case,
            }),
            MatchRule::Regex { pattern, field } => {
                let regex = RegexBuilder::new(pattern)
                    .size_limit(1 << 20)
                    .build()
                    .map_err(|e| invalid(format!("bad regex {pattern:?}: {e}")))?;
                Ok(Self::Regex {
                    regex,
                    field: *field,
                })
            }
        }
    }

    fn matches(&self, record: &ErrorRecord) -> bool {
        let code = record.code.as_deref();
        match self {
            Self::Code(expected) => code.is_some_and(|c| c.eq_ignore_ascii_case(expected)),
            Self::CodePrefix(prefix) => code
                .and_then(|c| c.get(..prefix.len()))
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            Self::MessageContains {
                needle,
                ignore_case: true,
            } => record.message.to_lowercase().contains(needle.as_str()),
            Self::MessageContains { needle, .. } => record.message.contains(needle.as_str()),
            Self::Regex { regex, field } => match field {
                MatchField::Message => regex.is_match(&record.message),
                MatchField::Code => code.is_some_and(|c| regex.is_match(c)),
                MatchField::Any => {
                    regex.is_match(&record.message) || code.is_some_and(|c| regex.is_match(c))
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Ordered rule table mapping error records to categories.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<(CompiledRule, CategoryId)>,
    categories: Vec<CategoryId>,
}

impl Classifier {
    /// Compile the configured categories, preserving their order.
    ///
    /// Fails with [`DomainError::InvalidRule`] on an empty predicate or a
    /// regex that does not compile.
    pub fn from_categories(categories: &[CategoryConfig]) -> DomainResult<Self> {
        let mut rules = Vec::new();
        let mut ids = Vec::with_capacity(categories.len());

        for category in categories {
            for rule in &category.rules {
                rules.push((CompiledRule::compile(&category.id, rule)?, category.id.clone()));
            }
            ids.push(category.id.clone());
        }

        tracing::debug!(
            categories = ids.len(),
            rules = rules.len(),
            "Compiled classification rules"
        );

        Ok(Self {
            rules,
            categories: ids,
        })
    }

    /// Category ids in priority order.
    pub fn categories(&self) -> &[CategoryId] {
        &self.categories
    }

    /// Tag for `record`: the category of the first matching rule, or
    /// `uncategorized`.
    pub fn category_of(&self, record: &ErrorRecord) -> CategoryId {
        self.rules
            .iter()
            .find(|(rule, _)| rule.matches(record))
            .map_or_else(CategoryId::uncategorized, |(_, id)| id.clone())
    }

    /// Return a copy of `record` tagged with its category.
    pub fn classify(&self, record: &ErrorRecord) -> ErrorRecord {
        record.clone().classified(self.category_of(record))
    }

    /// [`classify`](Self::classify) every record, keeping order.
    pub fn classify_all(&self, records: &[ErrorRecord]) -> Vec<ErrorRecord> {
        records.iter().map(|r| self.classify(r)).collect()
    }
}
