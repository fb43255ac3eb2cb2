use std::path::PathBuf;

use buildfix::cli::{Cli, Commands};
use clap::Parser;

#[test]
fn test_parse_fix_with_overrides() {
    let cli = Cli::try_parse_from([
        "buildfix",
        "fix",
        "--max-iterations",
        "5",
        "--stall-threshold",
        "3",
        "--workers",
        "8",
    ])
    .unwrap();

    match cli.command {
        Commands::Fix(args) => {
            assert_eq!(args.max_iterations, Some(5));
            assert_eq!(args.stall_threshold, Some(3));
            assert_eq!(args.workers, Some(8));
        }
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_execute_is_an_alias_for_fix() {
    let cli = Cli::try_parse_from(["buildfix", "execute"]).unwrap();
    match cli.command {
        Commands::Fix(args) => assert!(args.max_iterations.is_none()),
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "buildfix",
        "analyze",
        "--json",
        "--config",
        "ci.yaml",
        "--workspace",
        "src",
    ])
    .unwrap();

    assert!(matches!(cli.command, Commands::Analyze));
    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("ci.yaml")));
    assert_eq!(cli.workspace, Some(PathBuf::from("src")));
}

#[test]
fn test_parse_resume_and_status() {
    let cli = Cli::try_parse_from(["buildfix", "resume"]).unwrap();
    match cli.command {
        Commands::Resume(args) => assert!(args.run_id.is_none()),
        other => panic!("Wrong command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["buildfix", "resume", "abc-123"]).unwrap();
    match cli.command {
        Commands::Resume(args) => assert_eq!(args.run_id.as_deref(), Some("abc-123")),
        other => panic!("Wrong command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["buildfix", "status", "--all"]).unwrap();
    match cli.command {
        Commands::Status(args) => assert!(args.all),
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_status_all_conflicts_with_run_id() {
    assert!(Cli::try_parse_from(["buildfix", "status", "abc", "--all"]).is_err());
}

#[test]
fn test_parse_init_and_simulate() {
    let cli = Cli::try_parse_from(["buildfix", "init", "--force"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(args.force);
            assert_eq!(args.path, PathBuf::from("."));
        }
        other => panic!("Wrong command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["buildfix", "simulate"]).unwrap();
    assert!(matches!(cli.command, Commands::Simulate));
}

#[test]
fn test_rejects_invalid_numbers() {
    assert!(Cli::try_parse_from(["buildfix", "fix", "--workers", "many"]).is_err());
    assert!(Cli::try_parse_from(["buildfix", "fix", "--max-iterations", "-1"]).is_err());
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
