// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured progress events.
//!
//! Events are append-only: emitted once, written to the event stream as a
//! single JSON line and persisted to the event log. Records refer to step
//! ids for lookup only; deleting a workspace never invalidates an event.

use crate::id::{RunId, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State label carried by a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    RunCompleted,
    RunFailed,
    RunCancelled,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetrying,
    ContractPassed,
    ContractFailed,
    CompactionStarted,
    CompactionCompleted,
    Warning,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::RunCompleted => "run_completed",
            EventState::RunFailed => "run_failed",
            EventState::RunCancelled => "run_cancelled",
            EventState::StepStarted => "step_started",
            EventState::StepCompleted => "step_completed",
            EventState::StepFailed => "step_failed",
            EventState::StepRetrying => "step_retrying",
            EventState::ContractPassed => "contract_passed",
            EventState::ContractFailed => "contract_failed",
            EventState::CompactionStarted => "compaction_started",
            EventState::CompactionCompleted => "compaction_completed",
            EventState::Warning => "warning",
        }
    }

    /// Whether this event marks an error condition (for `logs --errors-only`).
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EventState::RunFailed
                | EventState::StepFailed
                | EventState::ContractFailed
                | EventState::Warning
        )
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured progress record.
///
/// Serialized as line-delimited JSON on the event stream; optional fields
/// are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Epoch milliseconds at emission.
    pub timestamp: u64,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub state: EventState,
    /// Duration since the run (or step, for step events) started.
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

impl ProgressEvent {
    /// Minimal event with the required fields; builder methods fill the rest.
    pub fn new(timestamp: u64, run_id: RunId, state: EventState) -> Self {
        Self {
            timestamp,
            run_id,
            step_id: None,
            state,
            duration_ms: 0,
            message: None,
            persona: None,
            artifacts: None,
            tokens_used: None,
        }
    }

    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_artifacts(mut self, names: Vec<String>) -> Self {
        self.artifacts = Some(names);
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
