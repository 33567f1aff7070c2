//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI
//! interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Maestro - AI agent task orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a project from a WBS file
    Run {
        /// Path to the WBS file
        wbs_path: PathBuf,

        /// Workspace directory
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// State file for crash recovery and resume
        #[arg(short, long)]
        state_file: Option<PathBuf>,

        /// Maximum concurrent agent subprocesses
        #[arg(short, long)]
        max_concurrent: Option<usize>,

        /// Simulate execution without invoking the agent
        #[arg(long)]
        dry_run: bool,

        /// Abort on the first task failure
        #[arg(long)]
        fail_fast: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show task status for a WBS file and saved state
    Status {
        /// Path to the WBS file
        wbs_path: PathBuf,

        /// State file written by a previous run
        #[arg(short, long)]
        state_file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parsing() {
        let cli = Cli::try_parse_from([
            "maestro",
            "run",
            "wbs.yaml",
            "--workspace",
            "/tmp/ws",
            "--max-concurrent",
            "5",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                wbs_path,
                workspace,
                max_concurrent,
                dry_run,
                fail_fast,
                ..
            } => {
                assert_eq!(wbs_path, PathBuf::from("wbs.yaml"));
                assert_eq!(workspace, Some(PathBuf::from("/tmp/ws")));
                assert_eq!(max_concurrent, Some(5));
                assert!(dry_run);
                assert!(!fail_fast);
            }
            Commands::Status { .. } => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_status_parsing_with_global_json() {
        let cli =
            Cli::try_parse_from(["maestro", "status", "wbs.yaml", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Status { .. }));
    }
}
