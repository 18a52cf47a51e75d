// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-engine: the execution engine
//!
//! The step executor drives one step end to end (workspace, prompt,
//! adapter, contract, retries); the scheduler fans ready steps out under
//! the concurrency cap and watches for cancellation; the runtime exposes
//! the public core operations the CLI calls.

#[cfg(test)]
pub mod test_helpers;

pub mod checkpoint;
pub mod clean;
pub mod error;
pub mod events;
pub mod executor;
pub mod prompt;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod scheduler;
pub mod workspace;

pub use checkpoint::{
    generate_checkpoint, inject_checkpoint_prompt, parse_checkpoint, validate_checkpoint_format,
    Checkpoint, CheckpointError, CHECKPOINT_FILE,
};
pub use clean::{CleanOptions, CleanSummary};
pub use error::EngineError;
pub use events::EventEmitter;
pub use executor::StepExecutor;
pub use registry::RunRegistry;
pub use relay::{should_compact, RelayConfig};
pub use runtime::{Runtime, RuntimeConfig, RunStatusReport};
pub use scheduler::PipelineScheduler;
pub use workspace::WorkspaceManager;
