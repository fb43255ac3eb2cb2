//! Per-iteration agent scheduling.
//!
//! Scheduling is split in two phases:
//!
//! 1. [`Scheduler::plan`] groups the classified errors by category, requests
//!    file locks in category priority order and decides, per category, which
//!    errors are dispatched and which are deferred.
//! 2. [`Scheduler::run`] spawns one worker per category with a non-empty
//!    grant, bounded by `max_workers`, collects every [`AgentResult`] and
//!    then clears the lock table.
//!
//! Agents never wait on each other. Contention is resolved at planning time
//! by leaving a file out of the later requester's grant.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentResult, CategoryId, ErrorRecord, StopSignal};
use crate::domain::ports::{resolve_in, FileGrant, FixAgent};

use super::agent_registry::AgentRegistry;
use super::lock_manager::LockManager;

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Root the error paths are resolved against.
    pub workspace: PathBuf,
    /// Agents allowed to run at once.
    pub max_workers: usize,
    /// Per-dispatch wall-clock limit.
    pub agent_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            max_workers: 4,
            agent_timeout: Duration::from_secs(600),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchPlan
// ---------------------------------------------------------------------------

/// One category's share of an iteration.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Category the dispatch is for.
    pub category: CategoryId,
    /// Bound agent variant, `None` if the registry has no agent for it.
    pub agent: Option<String>,
    /// Errors in granted files, paths resolved, sorted by file then line.
    pub errors: Vec<ErrorRecord>,
    /// Files locked for this category.
    pub granted: BTreeSet<PathBuf>,
    /// Errors in files another category holds this iteration.
    pub deferred: usize,
}

impl Dispatch {
    /// Whether a worker will run for this category.
    pub fn is_runnable(&self) -> bool {
        self.agent.is_some() && !self.granted.is_empty()
    }
}

/// The lock decisions for one iteration, in lock request order.
#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    /// 1-based iteration the plan was made for.
    pub iteration: u32,
    /// One entry per category with errors, in priority order.
    pub dispatches: Vec<Dispatch>,
    /// Errors no rule matched; never dispatched.
    pub uncategorized: usize,
}

impl DispatchPlan {
    /// Dispatches a worker will run for.
    pub fn runnable(&self) -> impl Iterator<Item = &Dispatch> {
        self.dispatches.iter().filter(|d| d.is_runnable())
    }

    /// Errors deferred across all categories.
    pub fn deferred(&self) -> usize {
        self.dispatches.iter().map(|d| d.deferred).sum()
    }

    /// Per-category error totals (dispatched + deferred), plus uncategorized.
    pub fn category_counts(&self) -> BTreeMap<CategoryId, usize> {
        let mut counts: BTreeMap<CategoryId, usize> = self
            .dispatches
            .iter()
            .map(|d| (d.category.clone(), d.errors.len() + d.deferred))
            .collect();
        if self.uncategorized > 0 {
            counts.insert(CategoryId::uncategorized(), self.uncategorized);
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Plans and runs the agents of one iteration.
#[derive(Debug)]
pub struct Scheduler {
    registry: AgentRegistry,
    locks: LockManager,
    /// Category ids in configured priority order.
    priority: Vec<CategoryId>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// A scheduler with an empty lock table.
    pub fn new(registry: AgentRegistry, priority: Vec<CategoryId>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            locks: LockManager::new(),
            priority,
            config,
        }
    }

    /// Lock table shared by every dispatch of this scheduler.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Lock request order for `iteration`.
    ///
    /// Priority order rotated by the iteration number, so a category that
    /// keeps losing a contended file gets first pick in a later iteration.
    /// Depends only on the rule order, the iteration and the categories
    /// present, which keeps resumed runs identical to uninterrupted ones.
    pub fn request_order(&self, iteration: u32, present: &BTreeSet<&CategoryId>) -> Vec<CategoryId> {
        let mut order: Vec<CategoryId> = self
            .priority
            .iter()
            .filter(|id| present.contains(id))
            .cloned()
            .collect();
        // Tags not in the configured table (custom registrations) go last.
        for &id in present {
            if !id.is_uncategorized() && !order.contains(id) {
                order.push(id.clone());
            }
        }
        if !order.is_empty() {
            let shift = usize::try_from(iteration.saturating_sub(1)).unwrap_or(0) % order.len();
            order.rotate_left(shift);
        }
        order
    }

    /// Group errors and acquire locks. The locks stay held until
    /// [`run`](Self::run) or [`discard`](Self::discard).
    pub fn plan(&self, iteration: u32, records: &[ErrorRecord]) -> DispatchPlan {
        let mut uncategorized = 0;
        let mut groups: BTreeMap<&CategoryId, Vec<ErrorRecord>> = BTreeMap::new();
        for record in records {
            if record.category.is_uncategorized() {
                uncategorized += 1;
                continue;
            }
            let resolved = ErrorRecord {
                file: resolve_in(&self.config.workspace, &record.file),
                ..record.clone()
            };
            groups.entry(&record.category).or_default().push(resolved);
        }

        let present: BTreeSet<&CategoryId> = groups.keys().copied().collect();
        let mut dispatches = Vec::with_capacity(present.len());

        for category in self.request_order(iteration, &present) {
            let Some(mut errors) = groups.remove(&category) else {
                continue;
            };
            errors.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

            let agent = self.registry.agent_name(&category).map(str::to_string);
            let granted = if agent.is_some() {
                let files: BTreeSet<&Path> = errors.iter().map(|e| e.file.as_path()).collect();
                self.locks.acquire(&category, files)
            } else {
                BTreeSet::new()
            };

            let (errors, deferred): (Vec<_>, Vec<_>) =
                errors.into_iter().partition(|e| granted.contains(&e.file));

            tracing::debug!(
                iteration,
                category = %category,
                granted_files = granted.len(),
                dispatched = errors.len(),
                deferred = deferred.len(),
                "Planned category"
            );

            dispatches.push(Dispatch {
                category,
                agent,
                errors,
                granted,
                deferred: deferred.len(),
            });
        }

        DispatchPlan {
            iteration,
            dispatches,
            uncategorized,
        }
    }

    /// Drop a plan without running it, releasing its locks.
    pub fn discard(&self, plan: DispatchPlan) {
        for dispatch in &plan.dispatches {
            self.locks.release(&dispatch.category);
        }
        self.locks.reset();
    }

    /// Run every runnable dispatch of `plan` concurrently and collect one
    /// result per category, in plan order.
    ///
    /// Agent errors, panics and timeouts become `failed` results for that
    /// category only. The lock table is empty when this returns.
    pub async fn run(&self, plan: DispatchPlan, stop: &StopSignal) -> DomainResult<Vec<AgentResult>> {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut slots: Vec<Slot> = Vec::with_capacity(plan.dispatches.len());

        for dispatch in plan.dispatches {
            let agent_impl = self.registry.get(&dispatch.category);
            let (Some(agent_name), Some(agent_impl)) = (dispatch.agent.clone(), agent_impl) else {
                slots.push(Slot::Done(AgentResult::failed(
                    dispatch.category,
                    "none",
                    0,
                    dispatch.deferred,
                    "no agent registered for category",
                )));
                continue;
            };
            if dispatch.granted.is_empty() {
                slots.push(Slot::Done(AgentResult::skipped(
                    dispatch.category,
                    agent_name,
                    dispatch.deferred,
                )));
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DomainError::AgentFailed {
                    agent: agent_name.clone(),
                    reason: "worker pool closed".to_string(),
                })?;

            let grant = FileGrant::new(
                agent_name.clone(),
                self.config.workspace.clone(),
                dispatch.granted.iter().cloned(),
                stop.clone(),
            );
            let attempted = dispatch.errors.len();
            let job = Job {
                category: dispatch.category.clone(),
                agent_name: agent_name.clone(),
                errors: dispatch.errors,
                deferred: dispatch.deferred,
                timeout: self.config.agent_timeout,
            };
            let handle = tokio::spawn(async move {
                let _permit = permit;
                job.execute(agent_impl, grant).await
            });

            slots.push(Slot::Running {
                category: dispatch.category,
                agent: agent_name,
                attempted,
                deferred: dispatch.deferred,
                handle,
            });
        }

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Done(result) => result,
                Slot::Running {
                    category,
                    agent,
                    attempted,
                    deferred,
                    handle,
                } => {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            tracing::error!(
                                category = %category,
                                agent = %agent,
                                error = %join_error,
                                "Agent worker panicked"
                            );
                            AgentResult::failed(
                                category.clone(),
                                agent,
                                attempted,
                                deferred,
                                format!("agent panicked: {join_error}"),
                            )
                        }
                    };
                    self.locks.release(&category);
                    result
                }
            };
            results.push(result);
        }
        self.locks.reset();

        tracing::info!(
            iteration = plan.iteration,
            agents = results.len(),
            resolved = results.iter().map(|r| r.resolved).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis(),
            "Scheduling phase complete"
        );

        Ok(results)
    }
}

/// A dispatch slot awaiting collection.
enum Slot {
    Done(AgentResult),
    Running {
        category: CategoryId,
        agent: String,
        attempted: usize,
        deferred: usize,
        handle: JoinHandle<AgentResult>,
    },
}

/// Everything a worker task owns.
struct Job {
    category: CategoryId,
    agent_name: String,
    errors: Vec<ErrorRecord>,
    deferred: usize,
    timeout: Duration,
}

impl Job {
    async fn execute(self, agent: Arc<dyn FixAgent>, grant: FileGrant) -> AgentResult {
        let attempted = self.errors.len();
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, agent.fix(&self.errors, &grant)).await;
        let result = match outcome {
            Ok(Ok(report)) => AgentResult::from_report(
                self.category,
                self.agent_name,
                attempted,
                self.deferred,
                report,
            ),
            Ok(Err(error)) => AgentResult::failed(
                self.category,
                self.agent_name,
                attempted,
                self.deferred,
                error.to_string(),
            ),
            Err(_) => AgentResult::failed(
                self.category,
                self.agent_name,
                attempted,
                self.deferred,
                format!("timed out after {}s", self.timeout.as_secs()),
            ),
        };

        tracing::info!(
            category = %result.category,
            agent = %result.agent,
            attempted = result.attempted,
            resolved = result.resolved,
            deferred = result.deferred,
            outcome = %result.outcome,
            elapsed_ms = started.elapsed().as_millis(),
            "Agent finished"
        );
        result
    }
}
