//! buildfix CLI entry point.

use clap::Parser;

use buildfix::cli::{handle_error, Cli, EXIT_ERROR};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let code = match buildfix::cli::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            handle_error(&err, json_mode);
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}
