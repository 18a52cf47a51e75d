// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wave - declarative multi-agent workflow orchestrator

mod commands;
mod exit;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "wave",
    version,
    about = "Wave - declarative orchestration for multi-agent pipelines"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Manifest file (defaults to wave.yaml in the project root)
    #[arg(long, global = true, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Data root override (state store, traces, workspaces)
    #[arg(long, global = true, value_name = "DIR")]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline
    Run(commands::run::RunArgs),
    /// Resume an interrupted or failed run
    Resume(commands::resume::ResumeArgs),
    /// Show one run's status
    Status(commands::status::StatusArgs),
    /// List runs
    List(commands::list::ListArgs),
    /// Show a run's event log
    Logs(commands::logs::LogsArgs),
    /// Cancel a run (graceful by default)
    Cancel(commands::cancel::CancelArgs),
    /// List a run's registered artifacts
    Artifacts(commands::artifacts::ArtifactsArgs),
    /// Remove run state and workspaces
    Clean(commands::clean::CleanArgs),
    /// Validate a pipeline against the manifest without executing
    Validate(commands::validate::ValidateArgs),
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("WAVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("error: cannot change to {}: {e}", dir.display());
            return exit::generic_failure();
        }
    }

    let context = commands::Context {
        manifest_path: cli.manifest,
        data_root: cli.data_root,
    };

    let result: Result<ExitCode> = match cli.command {
        Commands::Run(args) => commands::run::run(&context, args).await,
        Commands::Resume(args) => commands::resume::run(&context, args).await,
        Commands::Status(args) => commands::status::run(&context, args).await,
        Commands::List(args) => commands::list::run(&context, args).await,
        Commands::Logs(args) => commands::logs::run(&context, args).await,
        Commands::Cancel(args) => commands::cancel::run(&context, args).await,
        Commands::Artifacts(args) => commands::artifacts::run(&context, args).await,
        Commands::Clean(args) => commands::clean::run(&context, args).await,
        Commands::Validate(args) => commands::validate::run(&context, args),
    };

    match result {
        Ok(code) => code,
        Err(error) => exit::report(error),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
