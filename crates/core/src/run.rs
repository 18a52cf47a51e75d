// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run record and status state machine.

use crate::id::RunId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Status of a pipeline run.
///
/// Transitions form a monotone partial order:
/// `Pending → Running → {Completed | Failed | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from its persisted string form.
    pub fn parse(s: &str) -> Option<RunStatus> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Cancelled)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Cancelled)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal run transition {from} -> {to}")]
pub struct TransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// One execution of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    /// User input payload handed to the pipeline's input resolver.
    pub input: serde_json::Value,
    /// Id of the most recently dispatched step, for status display.
    pub current_step: Option<String>,
    /// Aggregated token count across all steps.
    pub total_tokens: u64,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub error: Option<String>,
    /// User-supplied tags (`--tag k=v`), sorted for stable serialization.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Run {
    /// Create a pending run record.
    pub fn new(
        id: RunId,
        pipeline_name: impl Into<String>,
        input: serde_json::Value,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Pending,
            input,
            current_step: None,
            total_tokens: 0,
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            error: None,
            tags: BTreeMap::new(),
        }
    }

    /// Attach tags to the run.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Apply a status transition, validating the partial order.
    pub fn transition(&mut self, next: RunStatus, epoch_ms: u64) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        match next {
            RunStatus::Running => self.started_at_ms = Some(epoch_ms),
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled => {
                self.completed_at_ms = Some(epoch_ms);
            }
            RunStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// Wall-clock duration so far (or final duration for terminal runs).
    pub fn duration_ms(&self, now_ms: u64) -> u64 {
        let start = match self.started_at_ms {
            Some(s) => s,
            None => return 0,
        };
        self.completed_at_ms.unwrap_or(now_ms).saturating_sub(start)
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
