// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory run registry.
//!
//! Tracks live runs for non-blocking status queries and enforces the
//! single in-process executing slot.

use crate::error::EngineError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use wave_core::{RunId, RunStatus};

/// Live view of one run.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub status: RunStatus,
    pub current_step: Option<String>,
    pub total_tokens: u64,
}

#[derive(Default)]
struct RegistryInner {
    runs: HashMap<RunId, RunEntry>,
    executing: Option<RunId>,
}

/// Registry guarded by a readers-writer lock; reads never block writes
/// for long because entries are tiny.
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the executing slot for a run. At most one run per process.
    pub fn claim(&self, run_id: &RunId) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if let Some(existing) = &inner.executing {
            return Err(EngineError::ExecutingSlotBusy(existing.to_string()));
        }
        inner.executing = Some(run_id.clone());
        inner.runs.insert(
            run_id.clone(),
            RunEntry {
                status: RunStatus::Pending,
                current_step: None,
                total_tokens: 0,
            },
        );
        Ok(())
    }

    /// Release the executing slot after the run reaches a terminal state.
    pub fn release(&self, run_id: &RunId) {
        let mut inner = self.inner.write();
        if inner.executing.as_ref() == Some(run_id) {
            inner.executing = None;
        }
    }

    /// Update the live entry.
    pub fn update(&self, run_id: &RunId, status: RunStatus, current_step: Option<String>, tokens: u64) {
        let mut inner = self.inner.write();
        inner.runs.insert(
            run_id.clone(),
            RunEntry {
                status,
                current_step,
                total_tokens: tokens,
            },
        );
    }

    /// Non-blocking status lookup.
    pub fn get(&self, run_id: &RunId) -> Option<RunEntry> {
        self.inner.read().runs.get(run_id).cloned()
    }

    /// Id of the currently executing run, if any.
    pub fn executing(&self) -> Option<RunId> {
        self.inner.read().executing.clone()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
