//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;
pub mod report;
pub mod types;

pub use context::{AppContext, LoopOverrides};
pub use report::{exit_code, RunReport};
pub use types::{Cli, Commands};

use anyhow::{Context, Result};

use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Exit code for usage, configuration and internal errors.
pub const EXIT_ERROR: i32 = 1;

/// Run a parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let json_mode = cli.json;

    // init must work before any configuration exists
    if matches!(cli.command, Commands::Init(_)) {
        let _logger = LoggerImpl::init(&LogConfig::default())?;
        return dispatch(None, cli.command, json_mode).await;
    }

    let ctx = AppContext::load(cli.config.as_deref(), cli.workspace.as_deref())?;
    let _logger = LoggerImpl::init(&LogConfig::from_settings(&ctx.config.logging)?)?;
    tracing::debug!(workspace = %ctx.workspace.display(), "Configuration loaded");

    dispatch(Some(ctx), cli.command, json_mode).await
}

async fn dispatch(ctx: Option<AppContext>, command: Commands, json_mode: bool) -> Result<i32> {
    let loaded = || ctx.clone().context("Configuration not loaded");
    match command {
        Commands::Init(args) => commands::init::execute(args, json_mode).await,
        Commands::Analyze => commands::analyze::execute(&loaded()?, json_mode).await,
        Commands::Fix(args) => commands::fix::execute(loaded()?, args, json_mode).await,
        Commands::Simulate => commands::simulate::execute(&loaded()?, json_mode).await,
        Commands::Resume(args) => commands::resume::execute(loaded()?, args, json_mode).await,
        Commands::Status(args) => commands::status::execute(&loaded()?, args, json_mode).await,
    }
}

/// Report a failed command on stdout (JSON mode) or stderr.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
}
