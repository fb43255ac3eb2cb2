//! Common test utilities for integration tests
//!
//! A source tree in a temp directory stands in for a real solution: every
//! line containing [`MARKER`] is reported by [`TreeBuild`] as an MSBuild
//! error, and [`MarkerAgent`] repairs those lines.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use buildfix::adapters::agents::source::SourceFile;
use buildfix::domain::errors::{DomainError, DomainResult};
use buildfix::domain::models::{
    AgentSpec, CategoryConfig, CategoryId, ErrorRecord, FixReport, MatchRule,
};
use buildfix::domain::ports::{
    errors_by_file, BuildOutput, BuildTool, CheckpointStore, FileGrant, FixAgent,
};
use buildfix::services::{
    AgentRegistry, Classifier, ConvergenceLoop, LoopConfig, Scheduler, SchedulerConfig,
};

pub const MARKER: &str = "#ERR";

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Append `count` error lines with `code` to `file`.
pub fn plant_errors(root: &Path, file: &str, code: &str, count: usize) {
    let path = root.join(file);
    let mut contents = std::fs::read_to_string(&path).unwrap_or_default();
    for i in 0..count {
        contents.push_str(&format!("var x{i} = 0; // {MARKER} {code} broken line {i}\n"));
    }
    std::fs::write(path, contents).unwrap();
}

/// Marker lines left in the tree.
pub fn remaining_errors(root: &Path) -> usize {
    source_files(root)
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .filter(|line| line.contains(MARKER))
                .count()
        })
        .sum()
}

fn source_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "cs"))
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// Simulated build
// ---------------------------------------------------------------------------

/// Reports every marker line of the tree in MSBuild format.
pub struct TreeBuild {
    root: PathBuf,
    calls: AtomicUsize,
}

impl TreeBuild {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_path_buf(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildTool for TreeBuild {
    fn name(&self) -> &str {
        "tree"
    }

    async fn build(&self) -> DomainResult<BuildOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut stdout = String::from("Build started.\n");
        let mut errors = 0;
        for path in source_files(&self.root) {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            let contents =
                std::fs::read_to_string(&path).map_err(|e| DomainError::io(&path, e))?;
            for (index, line) in contents.lines().enumerate() {
                let Some((_, tail)) = line.split_once(MARKER) else {
                    continue;
                };
                let (code, message) = tail.trim().split_once(' ').unwrap();
                stdout.push_str(&format!(
                    "  {name}({},13): error {code}: {message} [/ws/App.csproj]\n",
                    index + 1
                ));
                errors += 1;
            }
        }

        if errors == 0 {
            stdout.push_str("Build succeeded.\n    0 Warning(s)\n    0 Error(s)\n");
            Ok(BuildOutput::new(Some(0), stdout, ""))
        } else {
            stdout.push_str(&format!(
                "Build FAILED.\n    0 Warning(s)\n    {errors} Error(s)\n"
            ));
            Ok(BuildOutput::new(Some(1), stdout, ""))
        }
    }
}

// ---------------------------------------------------------------------------
// Deterministic agent
// ---------------------------------------------------------------------------

/// Replaces the marker lines it is handed with a comment.
#[derive(Default)]
pub struct MarkerAgent {
    /// Fix at most this many errors per call.
    pub limit: Option<usize>,
    /// Wait here before touching files.
    pub barrier: Option<Arc<Barrier>>,
    /// Succeed without changing anything.
    pub noop: bool,
    /// Fail every call.
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MarkerAgent {
    pub fn fixing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn limited(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: Some(limit),
            ..Self::default()
        })
    }

    pub fn noop() -> Arc<Self> {
        Arc::new(Self {
            noop: true,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn with_barrier(barrier: Arc<Barrier>) -> Arc<Self> {
        Arc::new(Self {
            barrier: Some(barrier),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixAgent for MarkerAgent {
    fn name(&self) -> &str {
        "marker"
    }

    async fn fix(&self, errors: &[ErrorRecord], grant: &FileGrant) -> DomainResult<FixReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail {
            return Err(DomainError::AgentFailed {
                agent: "marker".into(),
                reason: "refusing to work".into(),
            });
        }

        let mut report = FixReport::default();
        if self.noop {
            return Ok(report);
        }

        let mut budget = self.limit.unwrap_or(usize::MAX);
        for (path, file_errors) in errors_by_file(errors) {
            if budget == 0 {
                break;
            }
            let original = grant.read(path).await?;
            let mut source = SourceFile::parse(&original);
            let mut fixed = 0;
            for error in file_errors {
                if budget == 0 {
                    break;
                }
                let Some(line) = error.line else { continue };
                let broken = source.line(line).is_some_and(|text| text.contains(MARKER));
                if broken && source.set_line(line, format!("// fixed {line}")) {
                    fixed += 1;
                    budget -= 1;
                }
            }
            if fixed > 0 {
                grant.write(path, source.render()).await?;
                report.resolve(fixed);
                report.touch(grant.resolve(path));
            }
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Loop assembly
// ---------------------------------------------------------------------------

/// Category matching one error code.
pub fn code_category(id: &str, code: &str) -> CategoryConfig {
    CategoryConfig {
        id: CategoryId::new(id),
        description: None,
        rules: vec![MatchRule::Code {
            value: code.to_string(),
        }],
        agent: AgentSpec::RemoveDuplicate,
    }
}

/// Pair a one-code category with its agent.
pub fn bind(id: &str, code: &str, agent: Arc<dyn FixAgent>) -> (CategoryConfig, Arc<dyn FixAgent>) {
    (code_category(id, code), agent)
}

/// Build a loop over `root` whose categories are bound to the given agents,
/// highest priority first.
pub fn build_loop(
    root: &Path,
    build: Arc<dyn BuildTool>,
    bindings: Vec<(CategoryConfig, Arc<dyn FixAgent>)>,
    store: Arc<dyn CheckpointStore>,
    config: LoopConfig,
) -> ConvergenceLoop {
    let categories: Vec<CategoryConfig> = bindings.iter().map(|(c, _)| c.clone()).collect();
    let classifier = Classifier::from_categories(&categories).unwrap();

    let mut registry = AgentRegistry::new();
    for (category, agent) in bindings {
        registry.register(category.id, agent);
    }
    let priority = categories.iter().map(|c| c.id.clone()).collect();
    let scheduler = Scheduler::new(
        registry,
        priority,
        SchedulerConfig {
            workspace: root.to_path_buf(),
            max_workers: 4,
            agent_timeout: Duration::from_secs(30),
        },
    );

    ConvergenceLoop::new(build, classifier, scheduler, store, config)
}
