// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step execution record.

use crate::id::{RunId, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// State of a step execution.
///
/// `Pending → Running → (Completed | Failed | Retrying → Running …)`.
/// Terminal states: `Completed`, `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
            StepState::Retrying => "retrying",
        }
    }

    pub fn parse(s: &str) -> Option<StepState> {
        match s {
            "pending" => Some(StepState::Pending),
            "running" => Some(StepState::Running),
            "completed" => Some(StepState::Completed),
            "failed" => Some(StepState::Failed),
            "retrying" => Some(StepState::Retrying),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Failed)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution record for one step inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub run_id: RunId,
    pub step_id: StepId,
    pub state: StepState,
    pub retry_count: u32,
    pub workspace_path: Option<PathBuf>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub tokens_used: u64,
    pub error: Option<String>,
}

impl StepExecution {
    pub fn new(run_id: RunId, step_id: StepId) -> Self {
        Self {
            run_id,
            step_id,
            state: StepState::Pending,
            retry_count: 0,
            workspace_path: None,
            started_at_ms: None,
            completed_at_ms: None,
            tokens_used: 0,
            error: None,
        }
    }

    /// Mark the step running in the given workspace.
    pub fn start(&mut self, workspace: PathBuf, epoch_ms: u64) {
        self.state = StepState::Running;
        self.workspace_path = Some(workspace);
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(epoch_ms);
        }
    }

    /// Record a retry: bump the counter and return to `Retrying`.
    ///
    /// The caller is responsible for giving the retry a fresh workspace
    /// before the next `start`.
    pub fn retry(&mut self, error: impl Into<String>) {
        self.state = StepState::Retrying;
        self.retry_count += 1;
        self.error = Some(error.into());
    }

    pub fn complete(&mut self, tokens: u64, epoch_ms: u64) {
        self.state = StepState::Completed;
        self.tokens_used += tokens;
        self.completed_at_ms = Some(epoch_ms);
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>, epoch_ms: u64) {
        self.state = StepState::Failed;
        self.completed_at_ms = Some(epoch_ms);
        self.error = Some(error.into());
    }

    pub fn duration_ms(&self, now_ms: u64) -> u64 {
        let start = match self.started_at_ms {
            Some(s) => s,
            None => return 0,
        };
        self.completed_at_ms.unwrap_or(now_ms).saturating_sub(start)
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
