// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave artifacts` — registered artifacts of a run.

use super::Context;
use crate::exit;
use crate::table::{Column, Table};
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use wave_core::{RunId, StepId};

#[derive(Args)]
pub struct ArtifactsArgs {
    /// Run id
    pub run_id: String,

    /// Only artifacts produced by this step
    #[arg(long, short = 's')]
    pub step: Option<String>,
}

pub async fn run(context: &Context, args: ArtifactsArgs) -> Result<ExitCode> {
    let runtime = context.runtime().await?;
    let run_id = RunId::new(&args.run_id);
    let step = args.step.as_deref().map(StepId::new);
    let artifacts = runtime.artifacts(&run_id, step.as_ref()).await?;

    let mut table = Table::new(vec![
        Column::left("STEP"),
        Column::left("NAME"),
        Column::left("TYPE"),
        Column::right("BYTES"),
        Column::left("PATH"),
    ]);
    for artifact in &artifacts {
        table.row(vec![
            artifact.step_id.to_string(),
            artifact.name.clone(),
            artifact.artifact_type.to_string(),
            artifact.size_bytes.to_string(),
            artifact.path.display().to_string(),
        ]);
    }
    print!("{}", table.render());
    Ok(exit::success())
}
