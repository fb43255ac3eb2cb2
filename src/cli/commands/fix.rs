//! Implementation of the `buildfix fix` command.

use anyhow::Result;
use clap::Args;

use crate::cli::context::{ctrl_c_stop_signal, AppContext, LoopOverrides};
use crate::cli::output::output;
use crate::cli::report::{exit_code, RunReport};

/// Arguments of `fix`.
#[derive(Args, Debug, Default)]
pub struct FixArgs {
    /// Maximum number of fix iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Consecutive non-improving iterations before giving up
    #[arg(long, value_name = "K")]
    pub stall_threshold: Option<u32>,

    /// Maximum agents running at once
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl From<&FixArgs> for LoopOverrides {
    fn from(args: &FixArgs) -> Self {
        Self {
            max_iterations: args.max_iterations,
            stall_threshold: args.stall_threshold,
            workers: args.workers,
        }
    }
}

/// Start a new run and drive it to a terminal status.
pub async fn execute(mut ctx: AppContext, args: FixArgs, json_mode: bool) -> Result<i32> {
    ctx.apply(LoopOverrides::from(&args))?;

    let store = ctx.open_store().await?;
    let convergence = ctx.convergence_loop(store, ctrl_c_stop_signal())?;

    let state = convergence.run().await?;
    output(&RunReport::from(&state), json_mode);
    Ok(exit_code(&state.status))
}
