//! Implementation of the `buildfix status` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::context::AppContext;
use crate::cli::output::output;
use crate::cli::report::{RunListOutput, RunReport};

/// Arguments of `status`.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Run to show (defaults to the most recent run)
    pub run_id: Option<String>,

    /// List every stored run
    #[arg(short, long, conflicts_with = "run_id")]
    pub all: bool,
}

/// Print one run or every stored run.
pub async fn execute(ctx: &AppContext, args: StatusArgs, json_mode: bool) -> Result<i32> {
    let store = ctx.open_store().await?;

    if args.all {
        let runs = store.list().await?;
        output(
            &RunListOutput {
                runs: runs.iter().map(RunReport::from).collect(),
            },
            json_mode,
        );
        return Ok(0);
    }

    let run_id = match args.run_id {
        Some(run_id) => run_id,
        None => store.latest().await?.context("No runs found")?,
    };
    let state = store.load(&run_id).await?;
    output(&RunReport::from(&state), json_mode);
    Ok(0)
}
