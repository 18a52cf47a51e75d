// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave list` — runs, newest first.

use super::Context;
use crate::exit;
use crate::table::{Column, Table};
use anyhow::{anyhow, Result};
use clap::Args;
use std::process::ExitCode;
use wave_core::{iso_utc, RunStatus};
use wave_storage::ListFilter;

#[derive(Args)]
pub struct ListArgs {
    /// Filter by status (pending|running|completed|failed|cancelled)
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by pipeline name
    #[arg(long)]
    pub pipeline: Option<String>,

    /// Filter by tag (key=value)
    #[arg(long, value_name = "KEY=VALUE")]
    pub tag: Option<String>,

    /// Maximum rows
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: u32,
}

pub async fn run(context: &Context, args: ListArgs) -> Result<ExitCode> {
    let status = args
        .status
        .as_deref()
        .map(|s| RunStatus::parse(s).ok_or_else(|| anyhow!("unknown status {s:?}")))
        .transpose()?;
    let tag = args
        .tag
        .as_deref()
        .map(|t| {
            t.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("tag filter {t:?} is not key=value"))
        })
        .transpose()?;

    let filter = ListFilter {
        status,
        pipeline_name: args.pipeline.clone(),
        tag,
        limit: Some(args.limit),
    };

    let runtime = context.runtime().await?;
    let runs = runtime.list_runs(&filter).await?;

    let mut table = Table::new(vec![
        Column::left("RUN"),
        Column::left("PIPELINE"),
        Column::left("STATUS"),
        Column::left("CREATED"),
        Column::right("TOKENS"),
    ]);
    for run in &runs {
        table.row(vec![
            run.id.to_string(),
            run.pipeline_name.clone(),
            run.status.to_string(),
            iso_utc(run.created_at_ms),
            run.total_tokens.to_string(),
        ]);
    }
    print!("{}", table.render());
    Ok(exit::success())
}
