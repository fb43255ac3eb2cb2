//! Category to agent bindings.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::agents::create_agent;
use crate::domain::errors::DomainResult;
use crate::domain::models::{CategoryConfig, CategoryId};
use crate::domain::ports::FixAgent;

/// Registry of the agent bound to each category.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<CategoryId, Arc<dyn FixAgent>>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bindings: Vec<_> = self
            .agents
            .iter()
            .map(|(id, agent)| (id.as_str(), agent.name()))
            .collect();
        bindings.sort_unstable();
        f.debug_struct("AgentRegistry")
            .field("agents", &bindings)
            .finish()
    }
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the configured built-in agent for every category.
    pub fn from_categories(categories: &[CategoryConfig]) -> DomainResult<Self> {
        let mut registry = Self::new();
        for category in categories {
            registry.register(category.id.clone(), create_agent(&category.id, &category.agent)?);
        }
        Ok(registry)
    }

    /// Bind `agent` to `category`, replacing any previous binding.
    pub fn register(&mut self, category: CategoryId, agent: Arc<dyn FixAgent>) {
        self.agents.insert(category, agent);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_agent(mut self, category: impl Into<CategoryId>, agent: Arc<dyn FixAgent>) -> Self {
        self.register(category.into(), agent);
        self
    }

    /// Agent bound to `category`.
    pub fn get(&self, category: &CategoryId) -> Option<Arc<dyn FixAgent>> {
        self.agents.get(category).cloned()
    }

    /// Variant name of the agent bound to `category`.
    pub fn agent_name(&self, category: &CategoryId) -> Option<&str> {
        self.agents.get(category).map(|agent| agent.name())
    }

    /// Number of bound categories.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no category has an agent.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
