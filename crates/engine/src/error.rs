// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Every error carries a stable tag (the variant) and an actionable
//! message. Step-local errors are absorbed by the retry budget where
//! possible; the rest fail the run.

use thiserror::Error;
use wave_adapters::AdapterError;
use wave_contract::{ContractError, ContractFailure};
use wave_manifest::ManifestError;
use wave_security::SecurityError;
use wave_storage::StorageError;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),
    #[error("pipeline invalid: {0}")]
    PipelineInvalid(String),
    #[error("security rejected: {0}")]
    SecurityRejected(#[from] SecurityError),
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("adapter error: {0}")]
    Adapter(String),
    #[error("adapter timed out after {0}s")]
    AdapterTimeout(u64),
    #[error("adapter crashed: {0}")]
    AdapterCrash(String),
    #[error("adapter exited {code}: {detail}")]
    AdapterNonZero { code: i32, detail: String },
    #[error("output parse error: {0}")]
    OutputParse(String),
    #[error("contract failed ({kind}): {summary}", kind = .0.kind.as_str(), summary = contract_summary(.0))]
    ContractFailed(ContractFailure),
    #[error("checkpoint invalid: {0}")]
    CheckpointInvalid(String),
    #[error("state error: {0}")]
    State(#[from] StorageError),
    #[error("run cancelled")]
    Cancelled,
    #[error("run cancelled by force; in-flight step killed")]
    CancelledForce,
    #[error("relay error: {0}")]
    Relay(String),
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("another run is already executing in this process: {0}")]
    ExecutingSlotBusy(String),
}

fn contract_summary(failure: &ContractFailure) -> String {
    failure
        .violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ManifestError> for EngineError {
    fn from(err: ManifestError) -> Self {
        match &err {
            ManifestError::ManifestInvalid { .. } => EngineError::ManifestInvalid(err.to_string()),
            _ => EngineError::PipelineInvalid(err.to_string()),
        }
    }
}

impl From<AdapterError> for EngineError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout(secs) => EngineError::AdapterTimeout(secs),
            AdapterError::NonZeroExit { code, stderr_tail } => EngineError::AdapterNonZero {
                code,
                detail: stderr_tail,
            },
            AdapterError::Crash(detail) => EngineError::AdapterCrash(detail),
            AdapterError::OutputParse(detail) => EngineError::OutputParse(detail),
            AdapterError::Cancelled => EngineError::CancelledForce,
            other => EngineError::Adapter(other.to_string()),
        }
    }
}

impl From<ContractError> for EngineError {
    fn from(err: ContractError) -> Self {
        EngineError::PipelineInvalid(err.to_string())
    }
}

impl EngineError {
    /// Whether the step retry budget may absorb this error.
    ///
    /// Hook blocks are a policy refusal (no retry); cancellation and
    /// state errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::ContractFailed(failure) => failure.retryable,
            EngineError::AdapterTimeout(_)
            | EngineError::AdapterCrash(_)
            | EngineError::AdapterNonZero { .. }
            | EngineError::OutputParse(_) => true,
            _ => false,
        }
    }
}
