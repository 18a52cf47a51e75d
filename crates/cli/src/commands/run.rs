// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave run` — execute a pipeline to a terminal status.

use super::{parse_input, parse_tags, Context};
use crate::exit;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline file
    pub pipeline: PathBuf,

    /// Input payload: inline JSON, or plain text
    #[arg(long, short = 'i')]
    pub input: Option<String>,

    /// Tags attached to the run (repeatable, key=value)
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    pub tags: Vec<String>,
}

pub async fn run(context: &Context, args: RunArgs) -> Result<ExitCode> {
    let pipeline = context.load_pipeline(&args.pipeline)?;
    let input = parse_input(args.input.as_deref());
    let tags = parse_tags(&args.tags)?;

    let runtime = context.runtime().await?;
    let (run_id, status) = runtime.execute(pipeline, input, tags).await?;

    let report = runtime.status(&run_id).await?;
    println!("{run_id}  {status}");
    if let Some(error) = &report.run.error {
        eprintln!("  {error}");
    }
    Ok(exit::for_run(status, report.run.error.as_deref()))
}
