// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace and state cleanup.
//!
//! Selection and removal are split so `--dry-run` reports exactly the set
//! a real clean would remove.

use crate::error::EngineError;
use crate::workspace::WorkspaceManager;
use std::sync::Arc;
use wave_core::{Run, RunId, RunStatus};
use wave_storage::{ListFilter, StateStore};

/// Clean selection policy.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Remove exactly this run.
    pub run_id: Option<String>,
    /// Remove terminal runs whose last activity is older than this many
    /// milliseconds.
    pub older_than_ms: Option<u64>,
    /// Remove terminal runs in this status.
    pub status: Option<RunStatus>,
    /// Keep the N newest runs, remove the rest.
    pub keep_last: Option<usize>,
    /// Remove everything.
    pub all: bool,
    /// Report without removing.
    pub dry_run: bool,
    /// Include non-terminal runs in the selection.
    pub force: bool,
}

/// What a clean removed (or would remove).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    pub removed: Vec<RunId>,
    pub freed_bytes: u64,
    pub dry_run: bool,
}

/// Select candidates, then (unless dry-run) remove their workspaces and
/// state rows.
pub async fn clean(
    store: &Arc<StateStore>,
    workspaces: &WorkspaceManager,
    options: &CleanOptions,
    now_ms: u64,
) -> Result<CleanSummary, EngineError> {
    let runs = store.list_runs(&ListFilter::default()).await?;
    let selected = select(&runs, options, now_ms);

    let mut freed_bytes = 0;
    let mut removed = Vec::with_capacity(selected.len());
    for run in &selected {
        freed_bytes += workspaces.run_size_bytes(run.id.as_str());
        removed.push(run.id.clone());
    }

    if !options.dry_run {
        for run in &selected {
            workspaces.clean_run(run.id.as_str())?;
            store.delete_run(&run.id).await?;
            tracing::info!(run_id = %run.id, "run cleaned");
        }
    }

    Ok(CleanSummary {
        removed,
        freed_bytes,
        dry_run: options.dry_run,
    })
}

/// Pure candidate selection; `clean --dry-run` and the real clean share
/// this exact path.
fn select<'r>(runs: &'r [Run], options: &CleanOptions, now_ms: u64) -> Vec<&'r Run> {
    let eligible = |run: &Run| options.force || run.status.is_terminal();

    if let Some(run_id) = &options.run_id {
        return runs
            .iter()
            .filter(|r| r.id.as_str() == run_id && eligible(r))
            .collect();
    }

    if options.all {
        return runs.iter().filter(|r| eligible(r)).collect();
    }

    if let Some(keep) = options.keep_last {
        // list_runs returns newest first.
        return runs.iter().skip(keep).filter(|r| eligible(r)).collect();
    }

    let mut selected: Vec<&Run> = runs.iter().filter(|r| eligible(r)).collect();

    if let Some(status) = options.status {
        selected.retain(|r| r.status == status);
    }
    if let Some(age) = options.older_than_ms {
        let cutoff = now_ms.saturating_sub(age);
        selected.retain(|r| {
            r.completed_at_ms
                .or(r.started_at_ms)
                .unwrap_or(r.created_at_ms)
                < cutoff
        });
    }

    // No criterion at all selects nothing rather than everything.
    if options.status.is_none() && options.older_than_ms.is_none() {
        selected.clear();
    }
    selected
}

#[cfg(test)]
#[path = "clean_tests.rs"]
mod tests;
