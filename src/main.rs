//! Maestro CLI entry point

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use maestro::cli::commands::{run, status};
use maestro::cli::{Cli, Commands};
use maestro::infrastructure::config::ConfigLoader;
use maestro::infrastructure::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            wbs_path,
            workspace,
            state_file,
            max_concurrent,
            dry_run,
            fail_fast,
            verbose,
        } => {
            let mut logging_config = config.logging.clone();
            if verbose {
                logging_config.level = "debug".to_string();
            }
            let _guard = logging::init(&logging_config)?;

            run::handle_run(
                run::RunArgs {
                    wbs_path,
                    workspace,
                    state_file,
                    max_concurrent,
                    dry_run,
                    fail_fast,
                    json: cli.json,
                },
                &config,
            )
            .await
        }
        Commands::Status {
            wbs_path,
            state_file,
        } => {
            status::handle_status(&wbs_path, state_file, cli.json)?;
            Ok(true)
        }
    }
}
