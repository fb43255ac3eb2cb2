//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::fix::FixArgs;
use super::commands::init::InitArgs;
use super::commands::resume::ResumeArgs;
use super::commands::status::StatusArgs;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "buildfix")]
#[command(about = "buildfix - Convergent build-error repair orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .buildfix/config.yaml and local.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Source tree to repair (overrides `workspace` from the configuration)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration to .buildfix/config.yaml
    Init(InitArgs),

    /// Build once and report errors per category
    Analyze,

    /// Run the convergence loop until the build is clean or the run ends
    #[command(visible_alias = "execute")]
    Fix(FixArgs),

    /// Show which agents would run on which files, without changing anything
    Simulate,

    /// Continue an interrupted run from its last checkpoint
    Resume(ResumeArgs),

    /// Show a run's checkpointed state
    Status(StatusArgs),
}
