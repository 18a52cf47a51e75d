// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit-code mapping.
//!
//! 0 success, 1 generic failure, 2 validation failure, 3 cancellation,
//! 4 timeout.

use std::process::ExitCode;
use wave_core::RunStatus;
use wave_engine::EngineError;

pub fn success() -> ExitCode {
    ExitCode::SUCCESS
}

pub fn generic_failure() -> ExitCode {
    ExitCode::from(1)
}

pub fn validation_failure() -> ExitCode {
    ExitCode::from(2)
}

pub fn cancelled() -> ExitCode {
    ExitCode::from(3)
}

pub fn timeout() -> ExitCode {
    ExitCode::from(4)
}

/// Exit code for a finished run.
pub fn for_run(status: RunStatus, error: Option<&str>) -> ExitCode {
    match status {
        RunStatus::Completed => success(),
        RunStatus::Cancelled => cancelled(),
        _ => {
            if error.unwrap_or("").contains("timed out") {
                timeout()
            } else {
                generic_failure()
            }
        }
    }
}

/// Print an error and choose its exit code.
pub fn report(error: anyhow::Error) -> ExitCode {
    eprintln!("error: {error:#}");
    match error.downcast_ref::<EngineError>() {
        Some(EngineError::ManifestInvalid(_))
        | Some(EngineError::PipelineInvalid(_))
        | Some(EngineError::SecurityRejected(_)) => validation_failure(),
        Some(EngineError::Cancelled) | Some(EngineError::CancelledForce) => cancelled(),
        Some(EngineError::AdapterTimeout(_)) => timeout(),
        _ => match error.downcast_ref::<wave_manifest::ManifestError>() {
            Some(_) => validation_failure(),
            None => generic_failure(),
        },
    }
}

#[cfg(test)]
#[path = "exit_tests.rs"]
mod tests;
