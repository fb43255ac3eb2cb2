//! Built-in fix agents.
//!
//! Each variant differs only in how it turns an error into a file edit; all
//! of them read and write through the [`FileGrant`](crate::domain::ports::FileGrant)
//! they are handed.

pub mod formatter;
pub mod insert_declaration;
pub mod remove_duplicate;
pub mod source;
pub mod text_rewrite;

use std::sync::Arc;
use std::time::Duration;

pub use formatter::FormatterAgent;
pub use insert_declaration::InsertDeclarationAgent;
pub use remove_duplicate::RemoveDuplicateAgent;
pub use text_rewrite::TextRewriteAgent;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentSpec, CategoryId};
use crate::domain::ports::FixAgent;

/// Instantiate the built-in agent a category is configured with.
pub fn create_agent(category: &CategoryId, spec: &AgentSpec) -> DomainResult<Arc<dyn FixAgent>> {
    let invalid = |e: regex::Error| DomainError::InvalidRule {
        category: category.to_string(),
        reason: format!("agent {}: {e}", spec.kind()),
    };

    let agent: Arc<dyn FixAgent> = match spec {
        AgentSpec::TextRewrite {
            find,
            replace,
            scope,
        } => Arc::new(TextRewriteAgent::new(find, replace.clone(), *scope).map_err(invalid)?),
        AgentSpec::Formatter {
            program,
            args,
            timeout_secs,
        } => Arc::new(FormatterAgent::new(
            program.clone(),
            args.clone(),
            Duration::from_secs(*timeout_secs),
        )),
        AgentSpec::RemoveDuplicate => Arc::new(RemoveDuplicateAgent::new()),
        AgentSpec::InsertDeclaration {
            text,
            message_pattern,
            anchor,
        } => Arc::new(
            InsertDeclarationAgent::new(text.clone(), message_pattern.as_deref(), anchor.as_deref())
                .map_err(invalid)?,
        ),
    };
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RewriteScope;

    #[test]
    fn creates_each_variant() {
        let id = CategoryId::new("c");
        let specs = [
            AgentSpec::TextRewrite {
                find: "a".into(),
                replace: "b".into(),
                scope: RewriteScope::Line,
            },
            AgentSpec::Formatter {
                program: "dotnet".into(),
                args: vec![],
                timeout_secs: 5,
            },
            AgentSpec::RemoveDuplicate,
            AgentSpec::InsertDeclaration {
                text: "using X;".into(),
                message_pattern: None,
                anchor: None,
            },
        ];
        for spec in &specs {
            assert_eq!(create_agent(&id, spec).unwrap().name(), spec.kind());
        }
    }

    #[test]
    fn bad_agent_regex_is_invalid_rule() {
        let spec = AgentSpec::TextRewrite {
            find: "(".into(),
            replace: String::new(),
            scope: RewriteScope::File,
        };
        let err = create_agent(&CategoryId::new("c"), &spec).err().unwrap();
        assert!(matches!(err, DomainError::InvalidRule { .. }));
    }
}
