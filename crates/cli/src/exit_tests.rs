// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    completed = { RunStatus::Completed, None, ExitCode::SUCCESS },
    cancelled = { RunStatus::Cancelled, None, ExitCode::from(3) },
    failed = { RunStatus::Failed, Some("adapter crashed: boom"), ExitCode::from(1) },
    timed_out = { RunStatus::Failed, Some("adapter timed out after 1800s"), ExitCode::from(4) },
)]
fn run_statuses_map_to_exit_codes(status: RunStatus, error: Option<&str>, expected: ExitCode) {
    // ExitCode has no PartialEq; compare via Debug formatting.
    assert_eq!(
        format!("{:?}", for_run(status, error)),
        format!("{expected:?}")
    );
}

#[test]
fn validation_errors_exit_two() {
    let err = anyhow::Error::new(EngineError::PipelineInvalid("cycle".to_string()));
    assert_eq!(format!("{:?}", report(err)), format!("{:?}", ExitCode::from(2)));
}

#[test]
fn engine_timeout_exits_four() {
    let err = anyhow::Error::new(EngineError::AdapterTimeout(60));
    assert_eq!(format!("{:?}", report(err)), format!("{:?}", ExitCode::from(4)));
}

#[test]
fn unknown_errors_exit_one() {
    let err = anyhow::anyhow!("something else");
    assert_eq!(format!("{:?}", report(err)), format!("{:?}", ExitCode::from(1)));
}
