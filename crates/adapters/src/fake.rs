// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapter runner for tests.
//!
//! Scripted per step id: each invocation pops the next queued response,
//! writes its declared files into the workspace, and returns its result.
//! Unscripted steps succeed with a small canned outcome.

use crate::{AdapterError, AdapterRunner, InvocationOutcome, InvocationRequest, InvocationSignals};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wave_core::TokenUsage;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub run_id: String,
    pub step_id: String,
    pub persona: String,
    pub prompt: String,
    pub system_prompt: String,
    pub workspace: PathBuf,
}

/// A scripted response for one invocation.
#[derive(Debug, Clone)]
pub struct FakeResponse {
    /// Files written into the workspace before returning (relative path,
    /// content).
    pub files: Vec<(String, String)>,
    pub result: Result<InvocationOutcome, AdapterError>,
    /// Cumulative token totals pushed to the usage channel.
    pub usage_reports: Vec<u64>,
    /// Simulated execution time; force-cancellation can interrupt it.
    pub delay_ms: u64,
}

impl FakeResponse {
    /// A success with the given result text and token count.
    pub fn ok(result_text: &str, tokens: u64) -> Self {
        Self {
            files: Vec::new(),
            result: Ok(InvocationOutcome {
                result_text: result_text.to_string(),
                usage: TokenUsage {
                    output_tokens: tokens,
                    ..Default::default()
                },
                duration_ms: 10,
                records: 2,
                post_hook_warnings: Vec::new(),
            }),
            usage_reports: Vec::new(),
            delay_ms: 0,
        }
    }

    /// A failure with the given adapter error.
    pub fn err(error: AdapterError) -> Self {
        Self {
            files: Vec::new(),
            result: Err(error),
            usage_reports: Vec::new(),
            delay_ms: 0,
        }
    }

    /// Add a file written into the workspace on invocation.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Add cumulative usage reports sent during the invocation.
    pub fn with_usage_reports(mut self, reports: Vec<u64>) -> Self {
        self.usage_reports = reports;
        self
    }

    /// Simulate a long-running invocation.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Default)]
struct FakeInner {
    responses: HashMap<String, VecDeque<FakeResponse>>,
    calls: Vec<FakeCall>,
}

/// Scriptable fake implementing [`AdapterRunner`].
#[derive(Clone, Default)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the given step id (FIFO per step).
    pub fn enqueue(&self, step_id: &str, response: FakeResponse) {
        self.inner
            .lock()
            .responses
            .entry(step_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// All invocations recorded so far.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().calls.clone()
    }

    /// Invocation count for one step.
    pub fn call_count(&self, step_id: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.step_id == step_id)
            .count()
    }
}

#[async_trait]
impl AdapterRunner for FakeRunner {
    async fn invoke(
        &self,
        request: InvocationRequest,
        signals: InvocationSignals,
    ) -> Result<InvocationOutcome, AdapterError> {
        let InvocationSignals {
            usage_tx,
            mut cancel_rx,
        } = signals;
        let response = {
            let mut inner = self.inner.lock();
            inner.calls.push(FakeCall {
                run_id: request.run_id.clone(),
                step_id: request.step_id.clone(),
                persona: request.persona.clone(),
                prompt: request.prompt.clone(),
                system_prompt: request.system_prompt.clone(),
                workspace: request.workspace.clone(),
            });
            inner
                .responses
                .get_mut(&request.step_id)
                .and_then(|queue| queue.pop_front())
        };

        let response = response.unwrap_or_else(|| FakeResponse::ok("ok", 100));

        for (rel, content) in &response.files {
            let path = request.workspace.join(rel);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(&path, content)
                .map_err(|e| AdapterError::Workspace(e.to_string()))?;
        }

        if let Some(tx) = &usage_tx {
            for total in &response.usage_reports {
                let _ = tx.send(*total).await;
            }
        }

        if response.delay_ms > 0 {
            let sleep = tokio::time::sleep(Duration::from_millis(response.delay_ms));
            match &mut cancel_rx {
                Some(rx) => {
                    tokio::select! {
                        () = sleep => {}
                        () = async {
                            loop {
                                if *rx.borrow() {
                                    return;
                                }
                                if rx.changed().await.is_err() {
                                    std::future::pending::<()>().await;
                                }
                            }
                        } => return Err(AdapterError::Cancelled),
                    }
                }
                None => sleep.await,
            }
        }

        response.result
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
