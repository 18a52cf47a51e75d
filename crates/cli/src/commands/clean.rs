// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave clean` — remove run state and workspaces.

use super::Context;
use crate::exit;
use anyhow::{anyhow, Result};
use clap::Args;
use std::process::ExitCode;
use wave_core::RunStatus;
use wave_engine::CleanOptions;

#[derive(Args)]
pub struct CleanArgs {
    /// Remove exactly this run
    #[arg(long, value_name = "RUN_ID")]
    pub run_id: Option<String>,

    /// Remove terminal runs older than this many days
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u64>,

    /// Remove terminal runs in this status
    #[arg(long)]
    pub status: Option<String>,

    /// Keep the N newest runs, remove the rest
    #[arg(long, value_name = "N")]
    pub keep_last: Option<usize>,

    /// Remove everything
    #[arg(long)]
    pub all: bool,

    /// Report what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,

    /// Include non-terminal runs
    #[arg(long)]
    pub force: bool,
}

pub async fn run(context: &Context, args: CleanArgs) -> Result<ExitCode> {
    let status = args
        .status
        .as_deref()
        .map(|s| RunStatus::parse(s).ok_or_else(|| anyhow!("unknown status {s:?}")))
        .transpose()?;

    let options = CleanOptions {
        run_id: args.run_id.clone(),
        older_than_ms: args.older_than.map(|days| days * 24 * 60 * 60 * 1000),
        status,
        keep_last: args.keep_last,
        all: args.all,
        dry_run: args.dry_run,
        force: args.force,
    };

    let runtime = context.runtime().await?;
    let summary = runtime.clean(&options).await?;

    let verb = if summary.dry_run { "would remove" } else { "removed" };
    println!(
        "{verb} {} run(s), {} bytes",
        summary.removed.len(),
        summary.freed_bytes
    );
    for run_id in &summary.removed {
        println!("  {run_id}");
    }
    Ok(exit::success())
}
