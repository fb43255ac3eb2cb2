//! buildfix - Convergent build-error repair orchestrator
//!
//! buildfix runs a build, parses the compiler errors, sorts them into
//! configured categories and dispatches one fix agent per category. Agents
//! run concurrently under exclusive per-file locks; the loop rebuilds and
//! repeats until the build is clean, the iteration budget is spent, or the
//! error count stops going down. Every iteration is checkpointed so an
//! interrupted run can be resumed.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the ports adapters implement
//! - **Service Layer** (`services`): parser, classifier, locks, scheduler, loop
//! - **Adapters** (`adapters`): build command, fix agents, checkpoint stores
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, file I/O
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use buildfix::cli::AppContext;
//! use buildfix::domain::models::StopSignal;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = AppContext::load(None, None)?;
//!     let store = ctx.open_store().await?;
//!     let state = ctx.convergence_loop(store, StopSignal::new())?.run().await?;
//!     println!("{}", state.status);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, ErrorRecord, RunState, RunStatus};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Classifier, ConvergenceLoop, ErrorParser, LockManager, Scheduler};
