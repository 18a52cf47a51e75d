// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Public core operations.
//!
//! `Runtime` is what callers (the CLI is one) drive: Execute, Resume,
//! Status, ListRuns, Logs, Cancel, Artifacts, Clean. One runtime per
//! process; the state store enforces single-writer across processes.

use crate::clean::{clean, CleanOptions, CleanSummary};
use crate::error::EngineError;
use crate::events::EventEmitter;
use crate::executor::StepExecutor;
use crate::registry::RunRegistry;
use crate::relay::RelayConfig;
use crate::scheduler::PipelineScheduler;
use crate::workspace::WorkspaceManager;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wave_adapters::AdapterRunner;
use wave_core::{
    generate_run_id, ArtifactRecord, Clock, ProgressEvent, Run, RunId, RunStatus, StepExecution,
    StepId,
};
use wave_manifest::{topological_order, validate_pipeline, Manifest, PipelineSpec};
use wave_storage::{ListFilter, StateStore, TraceLogger};

/// Filesystem layout for one runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Root for the store, traces, and workspaces.
    pub data_root: PathBuf,
    /// Project root mounts and persona prompts resolve against.
    pub project_root: PathBuf,
}

impl RuntimeConfig {
    /// Default data root: `$XDG_DATA_HOME/wave` (or `.wave` beside the
    /// project as a fallback).
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let data_root = dirs::data_dir()
            .map(|d| d.join("wave"))
            .unwrap_or_else(|| project_root.join(".wave"));
        Self {
            data_root,
            project_root,
        }
    }
}

/// Aggregated status answer for one run.
#[derive(Debug, Clone)]
pub struct RunStatusReport {
    pub run: Run,
    pub steps: Vec<StepExecution>,
    /// (completed steps, total steps) when progress was recorded.
    pub progress: Option<(u64, u64)>,
}

/// The engine's public surface.
pub struct Runtime<R, C: Clock> {
    manifest: Arc<Manifest>,
    store: Arc<StateStore>,
    trace: Arc<TraceLogger>,
    registry: RunRegistry,
    workspaces: WorkspaceManager,
    runner: R,
    clock: C,
    config: RuntimeConfig,
}

impl<R: AdapterRunner, C: Clock> Runtime<R, C> {
    /// Open the state store and audit trace, failing fast when the store
    /// is unavailable.
    pub async fn open(
        manifest: Manifest,
        runner: R,
        clock: C,
        config: RuntimeConfig,
    ) -> Result<Self, EngineError> {
        let store = Arc::new(StateStore::open(&config.data_root).await?);

        let audit = &manifest.runtime.audit;
        let trace_dir = resolve_under(&audit.log_dir, &config.data_root);
        let trace = Arc::new(TraceLogger::create(
            &trace_dir,
            clock.epoch_ms(),
            audit.log_all_tool_calls,
            audit.log_all_file_operations,
        )?);

        let workspace_root = resolve_under(&manifest.runtime.workspace_root, &config.data_root);
        let workspaces = WorkspaceManager::new(workspace_root);

        Ok(Self {
            manifest: Arc::new(manifest),
            store,
            trace,
            registry: RunRegistry::new(),
            workspaces,
            runner,
            clock,
            config,
        })
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Execute a pipeline to a terminal status; returns the run id and
    /// where it ended up. Run-level failures are a status, not an `Err`.
    pub async fn execute(
        &self,
        pipeline: PipelineSpec,
        input: serde_json::Value,
        tags: BTreeMap<String, String>,
    ) -> Result<(RunId, RunStatus), EngineError> {
        validate_pipeline(&pipeline, &self.manifest)?;

        let now = self.clock.epoch_ms();
        let run_id = generate_run_id(pipeline.name(), now);
        let mut run = Run::new(run_id.clone(), pipeline.name(), input, now).with_tags(tags);

        self.registry.claim(&run_id)?;
        let hash = pipeline_hash(&pipeline);
        if let Err(e) = self.store.insert_run(&run, &hash).await {
            self.registry.release(&run_id);
            return Err(e.into());
        }

        let status = self
            .drive(&mut run, pipeline, HashSet::new())
            .await
            .inspect_err(|_| self.registry.release(&run_id))?;
        Ok((run_id, status))
    }

    /// Resume an interrupted or failed run.
    ///
    /// Completed steps stay completed; `from_step` forces that step and
    /// everything downstream of it to re-execute.
    pub async fn resume(
        &self,
        run_id: &RunId,
        pipeline: PipelineSpec,
        from_step: Option<&str>,
    ) -> Result<RunStatus, EngineError> {
        validate_pipeline(&pipeline, &self.manifest)?;

        let mut run = self.store.get_run(run_id).await?;
        if run.status == RunStatus::Completed && from_step.is_none() {
            return Ok(RunStatus::Completed);
        }

        // Drift detection: warn when the pipeline changed under the run.
        let stored_hash = self.store.get_pipeline_hash(run_id).await?;
        let current_hash = pipeline_hash(&pipeline);
        if let Some(stored) = stored_hash {
            if stored != current_hash {
                tracing::warn!(
                    run_id = %run_id,
                    "pipeline definition changed since this run was created"
                );
                self.emitter()
                    .emit(
                        ProgressEvent::new(
                            self.clock.epoch_ms(),
                            run_id.clone(),
                            wave_core::EventState::Warning,
                        )
                        .with_message("pipeline definition drifted since original execution"),
                    )
                    .await?;
            }
        }

        let mut completed: HashSet<String> = self
            .store
            .get_steps(run_id)
            .await?
            .into_iter()
            .filter(|s| s.state == wave_core::StepState::Completed)
            .map(|s| parent_of(s.step_id.as_str()))
            .collect();

        if let Some(from) = from_step {
            invalidate_from(&pipeline, from, &mut completed);
        }

        // Re-open the record: a resumed run leaves its terminal state.
        run.status = RunStatus::Running;
        run.completed_at_ms = None;
        run.error = None;

        self.registry.claim(run_id)?;
        self.drive(&mut run, pipeline, completed)
            .await
            .inspect_err(|_| self.registry.release(run_id))
    }

    /// Aggregate status for one run.
    pub async fn status(&self, run_id: &RunId) -> Result<RunStatusReport, EngineError> {
        let run = self.store.get_run(run_id).await?;
        let steps = self.store.get_steps(run_id).await?;
        let progress = self
            .store
            .get_pipeline_progress(run_id)
            .await?
            .map(|(completed, total, _)| (completed, total));
        Ok(RunStatusReport {
            run,
            steps,
            progress,
        })
    }

    /// Runs matching a filter, newest first.
    pub async fn list_runs(&self, filter: &ListFilter) -> Result<Vec<Run>, EngineError> {
        Ok(self.store.list_runs(filter).await?)
    }

    /// Event log slice for a run.
    pub async fn logs(
        &self,
        run_id: &RunId,
        step: Option<&StepId>,
        errors_only: bool,
        since_ms: Option<u64>,
    ) -> Result<Vec<ProgressEvent>, EngineError> {
        // Existence check so an unknown id errors rather than returning
        // an empty stream.
        let _ = self.store.get_run(run_id).await?;
        Ok(self
            .store
            .list_events(run_id, step, errors_only, since_ms)
            .await?)
    }

    /// Request cancellation. Graceful by default; `force` kills the
    /// in-flight process group. Idempotent.
    pub async fn cancel(&self, run_id: &RunId, force: bool) -> Result<(), EngineError> {
        let run = self.store.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Ok(());
        }
        self.store
            .request_cancellation(run_id, force, self.clock.epoch_ms())
            .await?;
        let _ = self.trace.append(
            self.clock.epoch_ms(),
            "cancel",
            &format!("{run_id} force={force}"),
        );
        Ok(())
    }

    /// Registered artifacts for a run.
    pub async fn artifacts(
        &self,
        run_id: &RunId,
        step: Option<&StepId>,
    ) -> Result<Vec<ArtifactRecord>, EngineError> {
        Ok(self.store.list_artifacts(run_id, step).await?)
    }

    /// Remove workspaces and state per the options.
    pub async fn clean(&self, options: &CleanOptions) -> Result<CleanSummary, EngineError> {
        clean(&self.store, &self.workspaces, options, self.clock.epoch_ms()).await
    }

    fn emitter(&self) -> EventEmitter {
        EventEmitter::new(
            Arc::clone(&self.store),
            Some(self.config.data_root.join("events")),
        )
    }

    /// Build the executor/scheduler pair and run to a terminal status.
    async fn drive(
        &self,
        run: &mut Run,
        pipeline: PipelineSpec,
        completed: HashSet<String>,
    ) -> Result<RunStatus, EngineError> {
        let executor = Arc::new(StepExecutor::new(
            Arc::clone(&self.manifest),
            Arc::new(pipeline),
            self.config.project_root.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.trace),
            self.emitter(),
            self.workspaces.clone(),
            self.runner.clone(),
            self.clock.clone(),
        ));
        let scheduler = PipelineScheduler::new(
            executor,
            self.registry.clone(),
            RelayConfig::from(&self.manifest.runtime.relay),
            self.manifest.runtime.max_concurrent_workers,
        );
        scheduler.run(run, completed).await
    }
}

/// Resolve a configured path: absolute as-is, relative under `base`.
fn resolve_under(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Content hash of a pipeline definition, for drift detection on resume.
fn pipeline_hash(pipeline: &PipelineSpec) -> String {
    let bytes = serde_json::to_vec(pipeline).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{digest:x}")
}

/// Parent id for a worker id (`review[3]` -> `review`).
fn parent_of(step_id: &str) -> String {
    match step_id.find('[') {
        Some(cut) => step_id[..cut].to_string(),
        None => step_id.to_string(),
    }
}

/// Drop `from` and its transitive dependents from the completed set.
fn invalidate_from(pipeline: &PipelineSpec, from: &str, completed: &mut HashSet<String>) {
    let mut invalid: HashSet<&str> = HashSet::new();
    invalid.insert(from);
    // Topological order guarantees producers precede consumers, so one
    // forward pass closes the dependent set.
    for step in topological_order(pipeline) {
        if step
            .dependencies
            .iter()
            .any(|dep| invalid.contains(dep.as_str()))
        {
            invalid.insert(step.id.as_str());
        }
    }
    for id in invalid {
        completed.remove(id);
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
