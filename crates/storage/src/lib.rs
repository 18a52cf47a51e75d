// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-storage: durable run state and the audit trace
//!
//! SQLite in WAL mode with a single writer connection and a snapshot-read
//! pool; forward-only embedded migrations; plus the append-only redacted
//! trace log.

pub mod state;
pub mod trace;

pub use state::{ListFilter, PerformanceMetric, StateStore};
pub use trace::TraceLogger;

use thiserror::Error;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("state root locked by another process: {0}")]
    Locked(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
