// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn pending_run() -> Run {
    Run::new(
        RunId::new("hello-20260130-081409-a1b2c3"),
        "hello",
        json!({"issue": 42}),
        1_000,
    )
}

#[test]
fn run_walks_happy_path() {
    let mut run = pending_run();
    run.transition(RunStatus::Running, 2_000).unwrap();
    assert_eq!(run.started_at_ms, Some(2_000));

    run.transition(RunStatus::Completed, 9_000).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.completed_at_ms, Some(9_000));
    assert_eq!(run.duration_ms(99_999), 7_000);
}

#[parameterized(
    complete_from_pending = { RunStatus::Pending, RunStatus::Completed },
    fail_from_pending = { RunStatus::Pending, RunStatus::Failed },
    rerun_completed = { RunStatus::Completed, RunStatus::Running },
    uncancel = { RunStatus::Cancelled, RunStatus::Running },
    backwards = { RunStatus::Running, RunStatus::Pending },
)]
fn illegal_transitions_are_rejected(from: RunStatus, to: RunStatus) {
    let mut run = pending_run();
    run.status = from;
    let err = run.transition(to, 5_000).unwrap_err();
    assert_eq!(err, TransitionError { from, to });
}

#[test]
fn pending_run_can_be_cancelled_directly() {
    let mut run = pending_run();
    run.transition(RunStatus::Cancelled, 3_000).unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.status.is_terminal());
}

#[test]
fn status_string_round_trip() {
    for status in [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ] {
        assert_eq!(RunStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(RunStatus::parse("bogus"), None);
}

#[test]
fn run_serde_round_trip_preserves_record() {
    let mut run = pending_run().with_tags([("team".to_string(), "infra".to_string())].into());
    run.transition(RunStatus::Running, 2_000).unwrap();

    let json = serde_json::to_string(&run).unwrap();
    let back: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(back, run);
}

#[test]
fn duration_is_zero_before_start() {
    let run = pending_run();
    assert_eq!(run.duration_ms(10_000), 0);
}
