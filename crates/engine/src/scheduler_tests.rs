// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{
    pipeline, severity_schema, step, with_deps, with_json_output, with_md_output,
    with_schema_contract, TestHarness,
};
use std::collections::HashSet;
use std::time::Duration;
use wave_adapters::{AdapterError, FakeResponse};
use wave_core::StepState;

async fn drive(
    harness: &TestHarness,
    spec: wave_manifest::PipelineSpec,
    run: &mut Run,
) -> RunStatus {
    harness
        .scheduler(spec)
        .run(run, HashSet::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn linear_success_emits_the_expected_event_log() {
    // Scenario S1: a -> b; a has a schema contract, b injects a's output.
    let harness = TestHarness::new().await;
    let a = with_schema_contract(
        with_json_output(step("a"), "out", "out.json"),
        severity_schema(),
        2,
    );
    let mut b = with_md_output(with_deps(step("b"), &["a"]), "summary", "summary.md", true);
    b.memory.inject_artifacts = vec![wave_manifest::ArtifactRef {
        step: "a".to_string(),
        artifact: "out".to_string(),
        alias: None,
    }];
    let spec = pipeline("hello", vec![a, b]);

    harness.runner.enqueue(
        "a",
        FakeResponse::ok("a done", 100).with_file("out.json", r#"{"severity":"low"}"#),
    );
    harness.runner.enqueue(
        "b",
        FakeResponse::ok("b done", 50).with_file("summary.md", "# Summary\nfine\n"),
    );

    let mut run = harness.seed_run("r-1", "hello").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);

    // Artifact table contains exactly {a: out, b: summary}.
    let artifacts = harness.store.list_artifacts(&run.id, None).await.unwrap();
    let mut names: Vec<(String, String)> = artifacts
        .iter()
        .map(|a| (a.step_id.to_string(), a.name.clone()))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            ("a".to_string(), "out".to_string()),
            ("b".to_string(), "summary".to_string())
        ]
    );

    // Event log: start-a, contract-pass-a, complete-a, start-b,
    // complete-b, complete-run — six entries.
    let events = harness.store.list_events(&run.id, None, false, None).await.unwrap();
    let states: Vec<EventState> = events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            EventState::StepStarted,
            EventState::ContractPassed,
            EventState::StepCompleted,
            EventState::StepStarted,
            EventState::StepCompleted,
            EventState::RunCompleted,
        ],
        "{states:?}"
    );

    // Token totals aggregate across steps.
    let stored = harness.store.get_run(&run.id).await.unwrap();
    assert_eq!(stored.total_tokens, 150);
    assert_eq!(stored.status, RunStatus::Completed);
}

#[tokio::test]
async fn independent_steps_run_in_parallel_under_the_cap() {
    let harness = TestHarness::new().await;
    let spec = pipeline(
        "fan",
        vec![step("a"), step("b"), step("c"), with_deps(step("d"), &["a", "b", "c"])],
    );

    for id in ["a", "b", "c"] {
        harness
            .runner
            .enqueue(id, FakeResponse::ok("done", 10).with_delay_ms(150));
    }

    let mut run = harness.seed_run("r-1", "fan").await;
    let start = std::time::Instant::now();
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);

    // Three 150ms steps with max_concurrent_workers=4 overlap; serial
    // execution would need 450ms.
    assert!(
        start.elapsed() < Duration::from_millis(420),
        "steps did not overlap: {:?}",
        start.elapsed()
    );

    // d ran only after its three dependencies.
    let calls = harness.runner.calls();
    assert_eq!(calls.last().unwrap().step_id, "d");
}

#[tokio::test]
async fn step_failure_halts_scheduling() {
    let harness = TestHarness::new().await;
    let spec = pipeline(
        "failing",
        vec![step("a"), with_deps(step("b"), &["a"]), with_deps(step("c"), &["b"])],
    );

    harness.runner.enqueue("a", FakeResponse::ok("ok", 10));
    harness
        .runner
        .enqueue("b", FakeResponse::err(AdapterError::Crash("boom".to_string())));

    let mut run = harness.seed_run("r-1", "failing").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Failed);

    // c never started.
    assert_eq!(harness.runner.call_count("c"), 0);
    let stored = harness.store.get_run(&run.id).await.unwrap();
    assert!(stored.error.as_deref().unwrap_or("").contains("boom"));

    let events = harness.store.list_events(&run.id, None, false, None).await.unwrap();
    assert_eq!(events.last().unwrap().state, EventState::RunFailed);
}

#[tokio::test]
async fn graceful_cancellation_waits_for_in_flight_step() {
    // Scenario S3: d -> e -> f; cancel while d runs. d completes, e
    // never starts, the run ends cancelled.
    let harness = TestHarness::new().await;
    let spec = pipeline(
        "cancelme",
        vec![step("d"), with_deps(step("e"), &["d"]), with_deps(step("f"), &["e"])],
    );

    harness
        .runner
        .enqueue("d", FakeResponse::ok("d done", 10).with_delay_ms(600));

    let mut run = harness.seed_run("r-1", "cancelme").await;
    let store = std::sync::Arc::clone(&harness.store);
    let run_id = run.id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.request_cancellation(&run_id, false, 2_000).await.unwrap();
    });

    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Cancelled);

    // d finished normally and is marked completed.
    let steps = harness.store.get_steps(&run.id).await.unwrap();
    let d = steps.iter().find(|s| s.step_id == "d").unwrap();
    assert_eq!(d.state, StepState::Completed);

    // e was never dispatched: no record, no adapter call.
    assert!(steps.iter().all(|s| s.step_id != "e"));
    assert_eq!(harness.runner.call_count("e"), 0);

    let events = harness.store.list_events(&run.id, None, false, None).await.unwrap();
    assert_eq!(events.last().unwrap().state, EventState::RunCancelled);
}

#[tokio::test]
async fn force_cancellation_kills_the_running_step() {
    // Scenario S4: during d, cancel with force. d fails with the
    // cancellation error; partial files stay on disk unregistered.
    let harness = TestHarness::new().await;
    let spec = pipeline(
        "killme",
        vec![
            with_json_output(step("d"), "out", "out.json"),
            with_deps(step("e"), &["d"]),
        ],
    );

    harness.runner.enqueue(
        "d",
        FakeResponse::ok("never returned", 10)
            .with_file("partial.txt", "half-written")
            .with_delay_ms(10_000),
    );

    let mut run = harness.seed_run("r-1", "killme").await;
    let store = std::sync::Arc::clone(&harness.store);
    let run_id = run.id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.request_cancellation(&run_id, true, 2_000).await.unwrap();
    });

    let start = std::time::Instant::now();
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Cancelled);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "force cancel did not preempt"
    );

    let steps = harness.store.get_steps(&run.id).await.unwrap();
    let d = steps.iter().find(|s| s.step_id == "d").unwrap();
    assert_eq!(d.state, StepState::Failed);
    assert!(d.error.as_deref().unwrap().contains("cancelled by force"));

    // The partial file exists in the workspace but is not registered.
    let workspace = d.workspace_path.as_ref().unwrap();
    assert!(workspace.join("partial.txt").exists());
    assert!(harness.store.list_artifacts(&run.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn relay_compaction_feeds_the_next_step() {
    // Scenario S5: g's usage crosses 70% of the window; after g the
    // summarizer runs and h receives the checkpoint prefix.
    let harness = TestHarness::new().await;
    let spec = pipeline("relay", vec![step("g"), with_deps(step("h"), &["g"])]);

    harness.runner.enqueue(
        "g",
        FakeResponse::ok("long transcript of g", 10).with_usage_reports(vec![150_000]),
    );
    harness.runner.enqueue(
        "g.compact",
        FakeResponse::ok("Earlier work: parser extracted.", 30),
    );
    harness.runner.enqueue("h", FakeResponse::ok("h done", 10));

    let mut run = harness.seed_run("r-1", "relay").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);

    // The summarizer persona ran over g's transcript.
    let compact_calls: Vec<_> = harness
        .runner
        .calls()
        .into_iter()
        .filter(|c| c.step_id == "g.compact")
        .collect();
    assert_eq!(compact_calls.len(), 1);
    assert!(compact_calls[0].prompt.contains("long transcript of g"));

    // h got the injection prefix.
    let h_call = harness
        .runner
        .calls()
        .into_iter()
        .find(|c| c.step_id == "h")
        .unwrap();
    assert!(h_call.prompt.contains("Resume from this checkpoint"));
    assert!(h_call.prompt.contains("parser extracted"));

    // Compaction events were emitted.
    let events = harness.store.list_events(&run.id, None, false, None).await.unwrap();
    let states: Vec<EventState> = events.iter().map(|e| e.state).collect();
    assert!(states.contains(&EventState::CompactionStarted));
    assert!(states.contains(&EventState::CompactionCompleted));
}

#[tokio::test]
async fn below_threshold_usage_skips_compaction() {
    let harness = TestHarness::new().await;
    let spec = pipeline("quiet", vec![step("g"), with_deps(step("h"), &["g"])]);

    harness.runner.enqueue(
        "g",
        FakeResponse::ok("small", 10).with_usage_reports(vec![5_000]),
    );

    let mut run = harness.seed_run("r-1", "quiet").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);

    assert_eq!(harness.runner.call_count("g.compact"), 0);
    let h_call = harness
        .runner
        .calls()
        .into_iter()
        .find(|c| c.step_id == "h")
        .unwrap();
    assert!(!h_call.prompt.contains("checkpoint"));
}

#[tokio::test]
async fn matrix_fan_out_aggregates_under_parent() {
    let harness = TestHarness::new().await;
    let mut work = with_json_output(step("work"), "report", "report.json");
    work.strategy = Some(wave_manifest::StrategyDef {
        matrix: wave_manifest::MatrixDef {
            tasks: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
            from_input: None,
        },
    });
    let spec = pipeline("matrix", vec![work, with_deps(step("collect"), &["work"])]);

    for i in 0..3 {
        harness.runner.enqueue(
            &format!("work[{i}]"),
            FakeResponse::ok("done", 10).with_file("report.json", "{}"),
        );
    }

    let mut run = harness.seed_run("r-1", "matrix").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);

    // Workers ran; collect waited for the whole fan-out.
    for i in 0..3 {
        assert_eq!(harness.runner.call_count(&format!("work[{i}]")), 1);
    }
    assert_eq!(harness.runner.call_count("collect"), 1);

    // Outputs aggregate under the parent namespace as an indexed set.
    let artifacts = harness
        .store
        .list_artifacts(&run.id, Some(&wave_core::StepId::new("work")))
        .await
        .unwrap();
    let mut names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["report[0]", "report[1]", "report[2]"]);

    // The parent step record reflects the aggregate.
    let steps = harness.store.get_steps(&run.id).await.unwrap();
    let parent = steps.iter().find(|s| s.step_id == "work").unwrap();
    assert_eq!(parent.state, StepState::Completed);
    assert_eq!(parent.tokens_used, 30);
}

#[tokio::test]
async fn matrix_worker_failure_fails_the_parent() {
    let harness = TestHarness::new().await;
    let mut work = step("work");
    work.strategy = Some(wave_manifest::StrategyDef {
        matrix: wave_manifest::MatrixDef {
            tasks: vec!["alpha".to_string(), "beta".to_string()],
            from_input: None,
        },
    });
    let spec = pipeline("matrix", vec![work, with_deps(step("collect"), &["work"])]);

    harness.runner.enqueue("work[0]", FakeResponse::ok("ok", 10));
    harness.runner.enqueue(
        "work[1]",
        FakeResponse::err(AdapterError::Crash("worker died".to_string())),
    );

    let mut run = harness.seed_run("r-1", "matrix").await;
    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Failed);
    assert_eq!(harness.runner.call_count("collect"), 0);
}

#[tokio::test]
async fn matrix_tasks_from_input_field() {
    let harness = TestHarness::new().await;
    let mut work = step("work");
    work.strategy = Some(wave_manifest::StrategyDef {
        matrix: wave_manifest::MatrixDef {
            tasks: Vec::new(),
            from_input: Some("issues".to_string()),
        },
    });
    let spec = pipeline("matrix", vec![work]);

    let mut run = Run::new(
        wave_core::RunId::new("r-in"),
        "matrix",
        serde_json::json!({"issues": ["#1", "#2"]}),
        harness.clock.epoch_ms(),
    );
    harness.store.insert_run(&run, "h").await.unwrap();

    let status = drive(&harness, spec, &mut run).await;
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(harness.runner.call_count("work[0]"), 1);
    assert_eq!(harness.runner.call_count("work[1]"), 1);
}
