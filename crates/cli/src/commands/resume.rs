// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave resume` — continue an interrupted or failed run.

use super::Context;
use crate::exit;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use wave_core::RunId;

#[derive(Args)]
pub struct ResumeArgs {
    /// Run id
    pub run_id: String,

    /// Pipeline file the run was created from
    pub pipeline: PathBuf,

    /// Re-execute from this step (and everything downstream of it)
    #[arg(long, value_name = "STEP")]
    pub from_step: Option<String>,
}

pub async fn run(context: &Context, args: ResumeArgs) -> Result<ExitCode> {
    let pipeline = context.load_pipeline(&args.pipeline)?;
    let runtime = context.runtime().await?;
    let run_id = RunId::new(&args.run_id);

    let status = runtime
        .resume(&run_id, pipeline, args.from_step.as_deref())
        .await?;

    let report = runtime.status(&run_id).await?;
    println!("{run_id}  {status}");
    Ok(exit::for_run(status, report.run.error.as_deref()))
}
