//! Implementation of the `buildfix resume` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::context::{ctrl_c_stop_signal, AppContext};
use crate::cli::output::output;
use crate::cli::report::{exit_code, RunReport};

/// Arguments of `resume`.
#[derive(Args, Debug, Default)]
pub struct ResumeArgs {
    /// Run to resume (defaults to the most recent run)
    pub run_id: Option<String>,
}

/// Continue a stored run.
pub async fn execute(ctx: AppContext, args: ResumeArgs, json_mode: bool) -> Result<i32> {
    let store = ctx.open_store().await?;

    let run_id = match args.run_id {
        Some(run_id) => run_id,
        None => store
            .latest()
            .await?
            .context("No checkpointed runs to resume")?,
    };
    let state = store.load(&run_id).await?;

    let convergence = ctx.convergence_loop(store, ctrl_c_stop_signal())?;
    let state = convergence.resume(state).await?;

    output(&RunReport::from(&state), json_mode);
    Ok(exit_code(&state.status))
}
