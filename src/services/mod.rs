//! Orchestration services: everything between raw build output and a
//! terminal run status.

pub mod agent_registry;
pub mod classifier;
pub mod convergence_loop;
pub mod error_parser;
pub mod lock_manager;
pub mod scheduler;

pub use agent_registry::AgentRegistry;
pub use classifier::Classifier;
pub use convergence_loop::{ConvergenceLoop, LoopConfig, Measurement, Simulation};
pub use error_parser::{ErrorParser, ParseOutcome, ParsedBuild};
pub use lock_manager::LockManager;
pub use scheduler::{Dispatch, DispatchPlan, Scheduler, SchedulerConfig};
