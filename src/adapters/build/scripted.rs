//! Build tool that replays canned outputs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{BuildOutput, BuildTool};

/// Returns queued outputs in order, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedBuildTool {
    queue: Mutex<VecDeque<BuildOutput>>,
    last: Mutex<Option<BuildOutput>>,
    calls: Mutex<usize>,
}

impl ScriptedBuildTool {
    /// Queue `outputs` to be returned one per build.
    pub fn new(outputs: impl IntoIterator<Item = BuildOutput>) -> Self {
        Self {
            queue: Mutex::new(outputs.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of builds requested so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BuildTool for ScriptedBuildTool {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn build(&self) -> DomainResult<BuildOutput> {
        *self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;

        let next = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(output) = next {
            *last = Some(output);
        }
        Ok(last.clone().unwrap_or_else(|| BuildOutput::new(Some(0), "", "")))
    }
}
