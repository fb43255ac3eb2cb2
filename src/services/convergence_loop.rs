//! The convergence loop state machine.
//!
//! ```text
//!            build ──► parse ──► classify ──► plan/run agents ──► rebuild
//!              ▲                                                     │
//!              └───────────── running ◄── evaluate ◄─────────────────┘
//!                                           │
//!                     converged / stalled / exhausted / failed
//! ```
//!
//! Every iteration is committed to the checkpoint store before the next one
//! starts, so a resumed run always continues from an iteration boundary. The
//! post-fix build of iteration N doubles as the pre-fix build of N + 1.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CategoryId, ErrorRecord, FailureKind, IterationRecord, RunState, RunStatus, StopSignal,
};
use crate::domain::ports::{BuildTool, CheckpointStore};

use super::classifier::Classifier;
use super::error_parser::{ErrorParser, ParseOutcome};
use super::scheduler::{DispatchPlan, Scheduler};

/// Iteration limits.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Iteration budget for a fresh run.
    pub max_iterations: u32,
    /// Consecutive non-improving iterations that end the run as stalled.
    pub stall_threshold: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            stall_threshold: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// One build, parsed and classified.
#[derive(Debug, Clone)]
pub enum Measurement {
    /// The build could not be run or its output could not be trusted.
    ToolFailure(String),
    /// The build ran and its output was parsed.
    Measured {
        /// Located errors, tagged with their category.
        records: Vec<ErrorRecord>,
        /// Messages of errors without a file location.
        unlocated: Vec<String>,
    },
}

impl Measurement {
    /// Located plus unlocated errors, `None` for a tool failure.
    pub fn error_count(&self) -> Option<usize> {
        match self {
            Self::ToolFailure(_) => None,
            Self::Measured { records, unlocated } => Some(records.len() + unlocated.len()),
        }
    }

    /// Errors per category, including `uncategorized`.
    pub fn category_counts(&self) -> BTreeMap<CategoryId, usize> {
        let mut counts = BTreeMap::new();
        if let Self::Measured { records, .. } = self {
            for record in records {
                *counts.entry(record.category.clone()).or_default() += 1;
            }
        }
        counts
    }

    /// Messages of location-less errors, empty for a tool failure.
    pub fn unlocated(&self) -> &[String] {
        match self {
            Self::ToolFailure(_) => &[],
            Self::Measured { unlocated, .. } => unlocated,
        }
    }
}

/// Result of a dry-run planning pass.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Errors the first build reported.
    pub error_count: usize,
    /// Errors without a file location.
    pub unlocated: usize,
    /// Lock decisions the first iteration would make.
    pub plan: DispatchPlan,
}

// ---------------------------------------------------------------------------
// ConvergenceLoop
// ---------------------------------------------------------------------------

/// Drives analyze → classify → dispatch → rebuild until a terminal status.
pub struct ConvergenceLoop {
    build: Arc<dyn BuildTool>,
    parser: ErrorParser,
    classifier: Classifier,
    scheduler: Scheduler,
    store: Arc<dyn CheckpointStore>,
    config: LoopConfig,
    stop: StopSignal,
}

impl ConvergenceLoop {
    /// Wire the loop's collaborators with a fresh stop signal.
    pub fn new(
        build: Arc<dyn BuildTool>,
        classifier: Classifier,
        scheduler: Scheduler,
        store: Arc<dyn CheckpointStore>,
        config: LoopConfig,
    ) -> Self {
        Self {
            build,
            parser: ErrorParser::new(),
            classifier,
            scheduler,
            store,
            config,
            stop: StopSignal::new(),
        }
    }

    /// Share an externally owned stop signal (e.g. wired to Ctrl-C).
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Signal that stops the loop between iterations and agents between files.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Iteration limits in effect.
    pub fn config(&self) -> LoopConfig {
        self.config
    }

    /// The scheduler, and through it the lock table.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run the build once and classify what it reports.
    pub async fn measure(&self) -> Measurement {
        let output = match self.build.build().await {
            Ok(output) => output,
            Err(error) => {
                tracing::error!(tool = self.build.name(), error = %error, "Build invocation failed");
                return Measurement::ToolFailure(error.to_string());
            }
        };

        match self.parser.parse(&output) {
            ParseOutcome::Clean => Measurement::Measured {
                records: Vec::new(),
                unlocated: Vec::new(),
            },
            ParseOutcome::Errors(parsed) => Measurement::Measured {
                records: self.classifier.classify_all(&parsed.records),
                unlocated: parsed.unlocated,
            },
            ParseOutcome::ToolFailure(reason) => {
                tracing::error!(
                    tool = self.build.name(),
                    exit_code = ?output.exit_code,
                    reason = %reason,
                    "Build output unusable"
                );
                Measurement::ToolFailure(reason)
            }
        }
    }

    /// Build once and return the dispatch plan the first iteration would
    /// use, without running any agent or writing a checkpoint.
    pub async fn simulate(&self) -> DomainResult<Simulation> {
        match self.measure().await {
            Measurement::ToolFailure(reason) => Err(DomainError::ToolInvocation(reason)),
            Measurement::Measured { records, unlocated } => {
                let plan = self.scheduler.plan(1, &records);
                self.scheduler.discard(plan.clone());
                Ok(Simulation {
                    error_count: records.len() + unlocated.len(),
                    unlocated: unlocated.len(),
                    plan,
                })
            }
        }
    }

    /// Start a new run.
    pub async fn run(&self) -> DomainResult<RunState> {
        let state = RunState::new(self.config.max_iterations);
        tracing::info!(
            run_id = %state.run_id,
            max_iterations = state.max_iterations,
            stall_threshold = self.config.stall_threshold,
            "Starting convergence run"
        );
        self.drive(state).await
    }

    /// Continue a checkpointed run from its last committed iteration.
    ///
    /// Runs that already ended converged, exhausted or stalled are returned
    /// unchanged.
    pub async fn resume(&self, mut state: RunState) -> DomainResult<RunState> {
        if !state.status.is_resumable() {
            tracing::info!(
                run_id = %state.run_id,
                status = %state.status,
                "Run already finished; nothing to resume"
            );
            return Ok(state);
        }

        tracing::info!(
            run_id = %state.run_id,
            completed_iterations = state.current_iteration,
            previous_status = %state.status,
            "Resuming convergence run"
        );
        state.set_status(RunStatus::Running);
        self.drive(state).await
    }

    #[instrument(skip(self, state), fields(run_id = %state.run_id))]
    async fn drive(&self, mut state: RunState) -> DomainResult<RunState> {
        self.commit(&state).await?;

        let mut current = self.measure().await;

        loop {
            let (records, unlocated) = match current {
                Measurement::ToolFailure(reason) => {
                    return self
                        .finish(state, RunStatus::Failed {
                            kind: FailureKind::ToolInvocation,
                            detail: reason,
                        })
                        .await;
                }
                Measurement::Measured { records, unlocated } => (records, unlocated),
            };
            let errors_before = records.len() + unlocated.len();
            record_outstanding(&mut state, &records, unlocated.len());
            state.last_error_count = Some(errors_before);

            if errors_before == 0 {
                return self.finish(state, RunStatus::Converged).await;
            }
            if self.stop.is_triggered() {
                return self.finish(state, interrupted_status()).await;
            }
            if state.budget_spent() {
                return self.finish(state, RunStatus::Exhausted).await;
            }

            let iteration = state.current_iteration + 1;
            tracing::info!(iteration, errors = errors_before, "Starting iteration");

            let plan = self.scheduler.plan(iteration, &records);
            let uncategorized = plan.uncategorized;
            let results = self.scheduler.run(plan, &self.stop).await?;
            let interrupted = self.stop.is_triggered();

            let after = if interrupted {
                None
            } else {
                Some(self.measure().await)
            };
            let errors_after = after.as_ref().and_then(Measurement::error_count);

            state.push_iteration(IterationRecord {
                iteration,
                errors_before,
                errors_after,
                uncategorized,
                unlocated: unlocated.len(),
                results,
                interrupted,
                timestamp: Utc::now(),
            });

            tracing::info!(
                iteration,
                errors_before,
                errors_after = ?errors_after,
                stall_streak = state.trailing_stall_streak(),
                "Iteration complete"
            );

            let Some(measurement) = after else {
                return self.finish(state, interrupted_status()).await;
            };
            if let Measurement::Measured { records, unlocated } = &measurement {
                record_outstanding(&mut state, records, unlocated.len());
            }

            let status = match errors_after {
                None => None,
                Some(0) => Some(RunStatus::Converged),
                Some(_) if state.trailing_stall_streak() >= self.config.stall_threshold => {
                    Some(RunStatus::Stalled)
                }
                Some(_) if state.budget_spent() => Some(RunStatus::Exhausted),
                Some(_) => None,
            };
            if let Some(status) = status {
                return self.finish(state, status).await;
            }

            self.commit(&state).await?;
            current = measurement;
        }
    }

    /// Record a terminal (or interrupted) status and persist it.
    async fn finish(&self, mut state: RunState, status: RunStatus) -> DomainResult<RunState> {
        tracing::info!(
            run_id = %state.run_id,
            status = %status,
            iterations = state.current_iteration,
            remaining_errors = ?state.last_error_count,
            "Convergence run finished"
        );
        state.set_status(status);
        self.commit(&state).await?;
        Ok(state)
    }

    /// Persist `state`. A failed save ends the run: resume depends on it.
    async fn commit(&self, state: &RunState) -> DomainResult<()> {
        self.store.save(state).await.map_err(|error| match error {
            DomainError::CheckpointWrite { .. } => error,
            other => DomainError::CheckpointWrite {
                run_id: state.run_id.clone(),
                reason: other.to_string(),
            },
        })
    }
}

fn interrupted_status() -> RunStatus {
    RunStatus::Failed {
        kind: FailureKind::Interrupted,
        detail: "stop requested".to_string(),
    }
}

fn record_outstanding(state: &mut RunState, records: &[ErrorRecord], unlocated: usize) {
    let mut outstanding: BTreeMap<CategoryId, usize> = BTreeMap::new();
    for record in records {
        *outstanding.entry(record.category.clone()).or_default() += 1;
    }
    state.outstanding = outstanding;
    state.unlocated = unlocated;
    state.touch();
}
