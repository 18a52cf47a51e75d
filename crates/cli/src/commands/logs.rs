// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave logs` — a run's event stream.

use super::Context;
use crate::exit;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use std::time::Duration;
use wave_core::{iso_utc, ProgressEvent, RunId, StepId};

#[derive(Args)]
pub struct LogsArgs {
    /// Run id
    pub run_id: String,

    /// Only events for this step
    #[arg(long, short = 's')]
    pub step: Option<String>,

    /// Only error events
    #[arg(long)]
    pub errors_only: bool,

    /// Only events at or after this epoch-milliseconds timestamp
    #[arg(long, value_name = "MS")]
    pub since: Option<u64>,

    /// Keep polling for new events until the run finishes
    #[arg(long, short = 'f')]
    pub follow: bool,

    /// Emit raw JSON lines instead of formatted text
    #[arg(long)]
    pub json: bool,
}

fn print_event(event: &ProgressEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    let step = event
        .step_id
        .as_ref()
        .map(|s| s.as_str())
        .unwrap_or("-");
    let message = event.message.as_deref().unwrap_or("");
    println!(
        "{} {:<22} {:<12} {}",
        iso_utc(event.timestamp),
        event.state,
        step,
        message
    );
}

pub async fn run(context: &Context, args: LogsArgs) -> Result<ExitCode> {
    let runtime = context.runtime().await?;
    let run_id = RunId::new(&args.run_id);
    let step = args.step.as_deref().map(StepId::new);

    let mut since = args.since;
    loop {
        let events = runtime
            .logs(&run_id, step.as_ref(), args.errors_only, since)
            .await?;
        for event in &events {
            print_event(event, args.json);
        }
        if let Some(last) = events.last() {
            since = Some(last.timestamp + 1);
        }

        if !args.follow {
            break;
        }
        let report = runtime.status(&run_id).await?;
        if report.run.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Ok(exit::success())
}
