// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wave validate` — offline manifest and pipeline validation.

use super::Context;
use crate::exit;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use wave_manifest::topological_order;

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline file
    pub pipeline: PathBuf,
}

pub fn run(context: &Context, args: ValidateArgs) -> Result<ExitCode> {
    let pipeline = context.load_pipeline(&args.pipeline)?;

    let order: Vec<&str> = topological_order(&pipeline)
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    println!(
        "{}: ok ({} steps, order: {})",
        pipeline.name(),
        pipeline.steps.len(),
        order.join(" -> ")
    );
    Ok(exit::success())
}
