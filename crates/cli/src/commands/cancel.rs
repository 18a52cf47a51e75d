// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave cancel` — request cancellation of a run.

use super::Context;
use crate::exit;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use wave_core::RunId;

#[derive(Args)]
pub struct CancelArgs {
    /// Run id
    pub run_id: String,

    /// Kill the in-flight adapter's process group instead of waiting
    #[arg(long)]
    pub force: bool,
}

pub async fn run(context: &Context, args: CancelArgs) -> Result<ExitCode> {
    let runtime = context.runtime().await?;
    let run_id = RunId::new(&args.run_id);
    runtime.cancel(&run_id, args.force).await?;
    let mode = if args.force { "force" } else { "graceful" };
    println!("{run_id}  cancellation requested ({mode})");
    Ok(exit::success())
}
