// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave status` — one run's current state.

use super::Context;
use crate::exit;
use crate::table::{Column, Table};
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use wave_core::{format_elapsed_ms, iso_utc, RunId, SystemClock, Clock};

#[derive(Args)]
pub struct StatusArgs {
    /// Run id
    pub run_id: String,

    /// Emit the raw report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(context: &Context, args: StatusArgs) -> Result<ExitCode> {
    let runtime = context.runtime().await?;
    let run_id = RunId::new(&args.run_id);
    let report = runtime.status(&run_id).await?;
    let now_ms = SystemClock.epoch_ms();

    if args.json {
        let value = serde_json::json!({
            "run": report.run,
            "steps": report.steps,
            "progress": report.progress,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(exit::success());
    }

    println!("run:      {}", report.run.id);
    println!("pipeline: {}", report.run.pipeline_name);
    println!("status:   {}", report.run.status);
    println!("created:  {}", iso_utc(report.run.created_at_ms));
    if report.run.started_at_ms.is_some() {
        println!("elapsed:  {}", format_elapsed_ms(report.run.duration_ms(now_ms)));
    }
    println!("tokens:   {}", report.run.total_tokens);
    if let Some((completed, total)) = report.progress {
        println!("progress: {completed}/{total} steps");
    }
    if let Some(error) = &report.run.error {
        println!("error:    {error}");
    }

    if !report.steps.is_empty() {
        println!();
        let mut table = Table::new(vec![
            Column::left("STEP"),
            Column::left("STATE"),
            Column::right("RETRIES"),
            Column::right("TOKENS"),
            Column::left("ERROR"),
        ]);
        for step in &report.steps {
            table.row(vec![
                step.step_id.to_string(),
                step.state.to_string(),
                step.retry_count.to_string(),
                step.tokens_used.to_string(),
                step.error.clone().unwrap_or_default(),
            ]);
        }
        print!("{}", table.render());
    }

    Ok(exit::success())
}
