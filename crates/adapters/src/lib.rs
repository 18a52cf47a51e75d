// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-adapters: subprocess contracts with external LLM CLIs
//!
//! The `AdapterRunner` trait is the seam between the engine and whatever
//! CLI a persona is bound to. The headless runner projects settings and a
//! system prompt into the workspace, curates the environment, launches
//! the CLI in its own process group, enforces the timeout by killing the
//! whole group, and parses line-delimited JSON output.

pub mod env;
pub mod headless;
pub mod output;
pub mod process;
pub mod settings;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeResponse, FakeRunner};

pub use env::curated_env;
pub use headless::{AdapterKind, HeadlessRunner};
pub use output::{parse_stream, ParsedOutput};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use wave_core::TokenUsage;
use wave_security::PermissionSet;

/// Runtime signals wired into one invocation.
#[derive(Debug, Default)]
pub struct InvocationSignals {
    /// Receives cumulative token totals as structured records arrive, so
    /// the relay monitor can observe usage while the subprocess runs.
    pub usage_tx: Option<mpsc::Sender<u64>>,
    /// Flips to true on force-cancellation; the runner kills the whole
    /// process group and returns [`AdapterError::Cancelled`].
    pub cancel_rx: Option<watch::Receiver<bool>>,
}

impl InvocationSignals {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_usage(usage_tx: mpsc::Sender<u64>) -> Self {
        Self {
            usage_tx: Some(usage_tx),
            cancel_rx: None,
        }
    }
}

/// Failure classes from one adapter invocation, each surfaced as a typed
/// error to the executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("adapter binary not found: {0}")]
    BinaryNotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("adapter timed out after {0}s")]
    Timeout(u64),
    #[error("adapter crashed: {0}")]
    Crash(String),
    #[error("adapter exited {code}: {stderr_tail}")]
    NonZeroExit { code: i32, stderr_tail: String },
    #[error("output parse error: {0}")]
    OutputParse(String),
    #[error("pre-hook {hook} blocked execution (exit {code})")]
    HookBlocked { hook: String, code: i32 },
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("invocation cancelled by force; process group killed")]
    Cancelled,
}

/// Everything one invocation needs, resolved by the step executor.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub run_id: String,
    pub step_id: String,
    pub persona: String,
    /// Executable name, resolved on the host search path.
    pub binary: String,
    pub output_format: String,
    /// Step workspace; the subprocess runs here.
    pub workspace: PathBuf,
    pub prompt: String,
    /// Combined system prompt (persona ‖ restrictions ‖ contract directives).
    pub system_prompt: String,
    /// Effective permissions (adapter defaults merged with persona).
    pub permissions: PermissionSet,
    pub sandbox_domains: Vec<String>,
    /// Curated environment; the subprocess never inherits the full host env.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_turns: Option<u32>,
    pub pre_hooks: Vec<String>,
    pub post_hooks: Vec<String>,
    /// Absolute paths of adapter base project files to copy into the
    /// workspace before launch.
    pub project_files: Vec<PathBuf>,
}

/// Result of a completed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationOutcome {
    /// Final result text from the structured output.
    pub result_text: String,
    pub usage: TokenUsage,
    pub duration_ms: u64,
    /// Number of structured records parsed from stdout.
    pub records: usize,
    /// Advisory post-hook findings (non-zero exits).
    pub post_hook_warnings: Vec<String>,
}

/// Adapter seam between the engine and external LLM CLIs.
#[async_trait]
pub trait AdapterRunner: Clone + Send + Sync + 'static {
    /// Run one step invocation to completion.
    async fn invoke(
        &self,
        request: InvocationRequest,
        signals: InvocationSignals,
    ) -> Result<InvocationOutcome, AdapterError>;
}
