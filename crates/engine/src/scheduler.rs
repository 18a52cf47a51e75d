// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline scheduler.
//!
//! Dispatches ready steps in parallel under a single global semaphore
//! (matrix workers share the same permits), polls the cancellation record
//! between dispatches, and fails stop-the-world: after a step exhausts
//! its retries no new steps start, but in-flight steps finish unless a
//! force cancellation kills them.

use crate::checkpoint::Checkpoint;
use crate::error::EngineError;
use crate::executor::{StepExecutor, StepSuccess};
use crate::registry::RunRegistry;
use crate::relay::{should_compact, Compactor, RelayConfig};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use wave_adapters::AdapterRunner;
use wave_core::{Clock, EventState, ProgressEvent, Run, RunStatus, StepExecution, StepId};
use wave_manifest::{ready_steps, StepDef};

/// Cancellation poll cadence.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One finished dispatch, reported back to the scheduling loop.
enum StepDone {
    Success(Box<StepSuccess>),
    Failure {
        step_id: StepId,
        error: EngineError,
    },
    /// The executor observed the cancellation record before starting.
    Aborted,
}

/// Drives one run to a terminal status.
pub struct PipelineScheduler<R, C: Clock> {
    executor: Arc<StepExecutor<R, C>>,
    registry: RunRegistry,
    relay: RelayConfig,
    max_workers: usize,
}

impl<R: AdapterRunner, C: Clock> PipelineScheduler<R, C> {
    pub fn new(
        executor: Arc<StepExecutor<R, C>>,
        registry: RunRegistry,
        relay: RelayConfig,
        max_workers: usize,
    ) -> Self {
        Self {
            executor,
            registry,
            relay,
            max_workers: max_workers.max(1),
        }
    }

    /// Execute the pipeline for this run until a terminal status.
    ///
    /// `completed_seed` carries step ids already completed (resume).
    pub async fn run(
        &self,
        run: &mut Run,
        completed_seed: HashSet<String>,
    ) -> Result<RunStatus, EngineError> {
        let pipeline = Arc::clone(&self.executor.pipeline);
        let store = Arc::clone(&self.executor.store);
        let clock = self.executor.clock.clone();

        if run.status == RunStatus::Pending {
            run.transition(RunStatus::Running, clock.epoch_ms())
                .map_err(|e| EngineError::PipelineInvalid(e.to_string()))?;
        }
        store.update_run(run).await?;
        self.registry
            .update(&run.id, run.status, None, run.total_tokens);

        let total_steps = pipeline.steps.len() as u64;
        let mut completed = completed_seed;
        let mut dispatched: HashSet<String> = completed.iter().cloned().collect();
        let mut in_flight = 0usize;
        let mut cancelling = false;
        let mut failure: Option<EngineError> = None;
        let mut pending_checkpoint: Option<Checkpoint> = None;

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let (done_tx, mut done_rx) = mpsc::channel::<StepDone>(self.max_workers.max(4));
        let (force_tx, force_rx) = watch::channel(false);
        let mut poll = tokio::time::interval(CANCEL_POLL_INTERVAL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        store
            .upsert_pipeline_progress(
                &run.id,
                completed.len() as u64,
                total_steps,
                None,
                clock.epoch_ms(),
            )
            .await?;

        loop {
            // Dispatch whatever is ready, unless we are winding down.
            if !cancelling && failure.is_none() {
                let ready: Vec<StepDef> = ready_steps(&pipeline, &completed, &dispatched)
                    .into_iter()
                    .cloned()
                    .collect();
                for step in ready {
                    dispatched.insert(step.id.clone());
                    in_flight += 1;

                    run.current_step = Some(step.id.clone());
                    store.update_run(run).await?;
                    self.registry.update(
                        &run.id,
                        run.status,
                        run.current_step.clone(),
                        run.total_tokens,
                    );

                    self.spawn_step(
                        run.clone(),
                        step,
                        pending_checkpoint.clone(),
                        Arc::clone(&semaphore),
                        done_tx.clone(),
                        force_rx.clone(),
                    );
                }
            }

            // Terminal check once nothing is running.
            if in_flight == 0 {
                if cancelling {
                    return self.finalize(run, RunStatus::Cancelled, None).await;
                }
                if let Some(error) = failure.take() {
                    return self.finalize(run, RunStatus::Failed, Some(error)).await;
                }
                if completed.len() as u64 == total_steps {
                    return self.finalize(run, RunStatus::Completed, None).await;
                }
                // Validation guarantees progress; reaching here means the
                // graph and the completed set disagree.
                return self
                    .finalize(
                        run,
                        RunStatus::Failed,
                        Some(EngineError::PipelineInvalid(
                            "no runnable steps remain".to_string(),
                        )),
                    )
                    .await;
            }

            tokio::select! {
                Some(done) = done_rx.recv() => {
                    in_flight -= 1;
                    match done {
                        StepDone::Success(success) => {
                            completed.insert(parent_of(success.step_id.as_str()));
                            run.total_tokens += success.tokens;
                            store.update_run(run).await?;
                            store
                                .upsert_pipeline_progress(
                                    &run.id,
                                    completed.len() as u64,
                                    total_steps,
                                    run.current_step.as_deref(),
                                    clock.epoch_ms(),
                                )
                                .await?;
                            self.registry.update(
                                &run.id,
                                run.status,
                                run.current_step.clone(),
                                run.total_tokens,
                            );

                            // Relay: compact at the safe point between steps.
                            if should_compact(success.tokens_peak, &self.relay) {
                                pending_checkpoint = self
                                    .compact(run, &success, cancelling)
                                    .await
                                    .or(pending_checkpoint);
                            }
                        }
                        StepDone::Failure { step_id, error } => {
                            match error {
                                EngineError::Cancelled | EngineError::CancelledForce => {
                                    cancelling = true;
                                }
                                error => {
                                    tracing::error!(
                                        run_id = %run.id,
                                        step_id = %step_id,
                                        error = %error,
                                        "step failed, halting dispatch"
                                    );
                                    if failure.is_none() {
                                        failure = Some(error);
                                    }
                                }
                            }
                        }
                        StepDone::Aborted => {
                            cancelling = true;
                        }
                    }
                }
                _ = poll.tick() => {
                    if let Some((_, force)) = store.get_cancellation(&run.id).await? {
                        if !cancelling {
                            tracing::info!(run_id = %run.id, force, "cancellation observed");
                        }
                        cancelling = true;
                        if force {
                            let _ = force_tx.send(true);
                        }
                    }
                }
            }
        }
    }

    /// Spawn one step (or a matrix fan-out) as a task reporting to the
    /// completion channel.
    fn spawn_step(
        &self,
        run: Run,
        step: StepDef,
        checkpoint: Option<Checkpoint>,
        semaphore: Arc<Semaphore>,
        done_tx: mpsc::Sender<StepDone>,
        force_rx: watch::Receiver<bool>,
    ) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let done = match expand_matrix(&run, &step) {
                Err(error) => StepDone::Failure {
                    step_id: StepId::new(&step.id),
                    error,
                },
                Ok(None) => {
                    let _permit = semaphore.clone().acquire_owned().await.ok();
                    match executor
                        .execute_step(&run, &step, None, checkpoint, force_rx)
                        .await
                    {
                        Ok(success) => StepDone::Success(Box::new(success)),
                        Err(EngineError::Cancelled) => StepDone::Aborted,
                        Err(error) => StepDone::Failure {
                            step_id: StepId::new(&step.id),
                            error,
                        },
                    }
                }
                Ok(Some(tasks)) => {
                    run_matrix(
                        executor.clone(),
                        &run,
                        &step,
                        tasks,
                        checkpoint,
                        semaphore,
                        force_rx,
                    )
                    .await
                }
            };
            let _ = done_tx.send(done).await;
        });
    }

    /// Run compaction; failures degrade to a warning event.
    async fn compact(
        &self,
        run: &Run,
        success: &StepSuccess,
        cancelled: bool,
    ) -> Option<Checkpoint> {
        let clock = &self.executor.clock;
        let emitter = &self.executor.emitter;

        let started = ProgressEvent::new(clock.epoch_ms(), run.id.clone(), EventState::CompactionStarted)
            .with_step(success.step_id.clone())
            .with_tokens(success.tokens_peak);
        if let Err(e) = emitter.emit(started).await {
            tracing::warn!(error = %e, "compaction-start event failed");
        }

        let compactor = Compactor::new(&self.executor.manifest, self.executor.runner.clone());
        match compactor
            .compact(
                run.id.as_str(),
                success.step_id.as_str(),
                &success.transcript,
                &success.workspace,
                cancelled,
                clock.epoch_ms(),
            )
            .await
        {
            Ok(summary) => {
                let event = ProgressEvent::new(
                    clock.epoch_ms(),
                    run.id.clone(),
                    EventState::CompactionCompleted,
                )
                .with_step(success.step_id.clone());
                if let Err(e) = emitter.emit(event).await {
                    tracing::warn!(error = %e, "compaction event failed");
                }
                Some(Checkpoint {
                    title: "Checkpoint".to_string(),
                    summary,
                    decisions: Vec::new(),
                    generated_at: None,
                })
            }
            Err(error) => {
                tracing::warn!(run_id = %run.id, error = %error, "compaction failed");
                let event = ProgressEvent::new(clock.epoch_ms(), run.id.clone(), EventState::Warning)
                    .with_step(success.step_id.clone())
                    .with_message(format!("relay compaction failed: {error}"));
                if let Err(e) = emitter.emit(event).await {
                    tracing::warn!(error = %e, "warning event failed");
                }
                None
            }
        }
    }

    /// Commit the terminal status, emit the final event, and release the
    /// executing slot.
    async fn finalize(
        &self,
        run: &mut Run,
        status: RunStatus,
        error: Option<EngineError>,
    ) -> Result<RunStatus, EngineError> {
        let clock = &self.executor.clock;
        let store = &self.executor.store;

        if let Some(error) = &error {
            run.error = Some(error.to_string());
        }
        run.transition(status, clock.epoch_ms())
            .map_err(|e| EngineError::PipelineInvalid(e.to_string()))?;
        store.update_run(run).await?;
        store
            .upsert_pipeline_state(&run.pipeline_name, status, &run.input, clock.epoch_ms())
            .await?;
        self.registry
            .update(&run.id, status, run.current_step.clone(), run.total_tokens);
        self.registry.release(&run.id);

        let state = match status {
            RunStatus::Completed => EventState::RunCompleted,
            RunStatus::Cancelled => EventState::RunCancelled,
            _ => EventState::RunFailed,
        };
        let mut event = ProgressEvent::new(clock.epoch_ms(), run.id.clone(), state)
            .with_duration(run.duration_ms(clock.epoch_ms()))
            .with_tokens(run.total_tokens);
        if let Some(message) = &run.error {
            event = event.with_message(message.clone());
        }
        self.executor.emitter.emit(event).await?;

        tracing::info!(
            run_id = %run.id,
            status = %status,
            tokens = run.total_tokens,
            "run finished"
        );
        Ok(status)
    }
}

/// Parent id for a worker id (`review[3]` -> `review`).
fn parent_of(step_id: &str) -> String {
    match step_id.find('[') {
        Some(cut) => step_id[..cut].to_string(),
        None => step_id.to_string(),
    }
}

/// Expand a matrix strategy into its task list, if declared.
fn expand_matrix(run: &Run, step: &StepDef) -> Result<Option<Vec<String>>, EngineError> {
    let Some(strategy) = &step.strategy else {
        return Ok(None);
    };
    let matrix = &strategy.matrix;
    if !matrix.tasks.is_empty() {
        return Ok(Some(matrix.tasks.clone()));
    }
    let Some(field) = &matrix.from_input else {
        return Err(EngineError::PipelineInvalid(format!(
            "matrix on step {:?} has no task source",
            step.id
        )));
    };
    let items = run
        .input
        .get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            EngineError::PipelineInvalid(format!(
                "matrix input field {field:?} is not an array"
            ))
        })?;
    let tasks = items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    Ok(Some(tasks))
}

/// Run matrix workers concurrently under the shared semaphore and
/// aggregate them into one parent outcome.
async fn run_matrix<R: AdapterRunner, C: Clock>(
    executor: Arc<StepExecutor<R, C>>,
    run: &Run,
    step: &StepDef,
    tasks: Vec<String>,
    checkpoint: Option<Checkpoint>,
    semaphore: Arc<Semaphore>,
    force_rx: watch::Receiver<bool>,
) -> StepDone {
    let mut joins = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.into_iter().enumerate() {
        let executor = Arc::clone(&executor);
        let run = run.clone();
        let step = step.clone();
        let checkpoint = checkpoint.clone();
        let semaphore = Arc::clone(&semaphore);
        let force_rx = force_rx.clone();
        joins.push(tokio::spawn(async move {
            let _permit = semaphore.clone().acquire_owned().await.ok();
            executor
                .execute_step(&run, &step, Some((index, task)), checkpoint, force_rx)
                .await
        }));
    }

    let mut tokens = 0u64;
    let mut tokens_peak = 0u64;
    let mut artifact_names = Vec::new();
    let mut warnings = Vec::new();
    let mut transcript = String::new();
    let mut workspace = PathBuf::new();
    let mut first_error: Option<EngineError> = None;
    let mut aborted = false;

    for join in joins {
        match join.await {
            Ok(Ok(success)) => {
                tokens += success.tokens;
                tokens_peak = tokens_peak.max(success.tokens_peak);
                artifact_names.extend(success.artifact_names);
                warnings.extend(success.warnings);
                if !transcript.is_empty() {
                    transcript.push_str("\n---\n");
                }
                transcript.push_str(&success.transcript);
                workspace = success.workspace;
            }
            Ok(Err(EngineError::Cancelled)) => aborted = true,
            Ok(Err(error)) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            Err(join_err) => {
                if first_error.is_none() {
                    first_error = Some(EngineError::Workspace(format!(
                        "matrix worker panicked: {join_err}"
                    )));
                }
            }
        }
    }

    if let Some(error) = first_error {
        return StepDone::Failure {
            step_id: StepId::new(&step.id),
            error,
        };
    }
    if aborted {
        return StepDone::Aborted;
    }

    // Parent record: completed with the aggregate token count.
    let mut parent = StepExecution::new(run.id.clone(), StepId::new(&step.id));
    parent.start(workspace.clone(), executor.clock.epoch_ms());
    parent.complete(tokens, executor.clock.epoch_ms());
    if let Err(e) = executor.store.upsert_step(&parent).await {
        tracing::warn!(error = %e, "parent matrix record write failed");
    }

    StepDone::Success(Box::new(StepSuccess {
        step_id: StepId::new(&step.id),
        tokens,
        tokens_peak,
        artifact_names,
        warnings,
        transcript,
        workspace,
    }))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
