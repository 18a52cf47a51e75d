// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step executor: drives one step (or matrix worker) end to end.
//!
//! Per attempt: fresh workspace, mounts, injected artifacts, prompt,
//! adapter invocation, contract validation. The retry budget absorbs
//! contract failures and transient adapter failures with exponential
//! backoff; every retry runs in a distinct workspace with the repair
//! prompt appended. Artifacts are registered only after validation, so
//! partial writes from a killed subprocess never become visible.

use crate::checkpoint::{Checkpoint, CHECKPOINT_FILE};
use crate::error::EngineError;
use crate::events::EventEmitter;
use crate::prompt::{build_prompt, build_system_prompt, template_vars};
use crate::workspace::WorkspaceManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use wave_adapters::{AdapterRunner, InvocationRequest, InvocationSignals};
use wave_contract::{ContractOutcome, ValidationRequest};
use wave_core::{ArtifactRecord, Clock, EventState, ProgressEvent, Run, StepExecution, StepId};
use wave_manifest::{Manifest, PersonaDef, PipelineSpec, StepDef};
use wave_security::PermissionSet;
use wave_storage::{PerformanceMetric, StateStore, TraceLogger};

/// Default backoff base between retry attempts (1s, 2s, 4s, ...).
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// What a completed step hands back to the scheduler.
#[derive(Debug, Clone)]
pub struct StepSuccess {
    /// Executed id (worker id for matrix workers).
    pub step_id: StepId,
    pub tokens: u64,
    /// Peak cumulative usage observed during execution, for the relay.
    pub tokens_peak: u64,
    pub artifact_names: Vec<String>,
    pub warnings: Vec<String>,
    /// Adapter result text; the relay summarizes this transcript.
    pub transcript: String,
    pub workspace: PathBuf,
}

/// Executes steps against the shared run context.
pub struct StepExecutor<R, C: Clock> {
    pub manifest: Arc<Manifest>,
    pub pipeline: Arc<PipelineSpec>,
    pub project_root: PathBuf,
    pub store: Arc<StateStore>,
    pub trace: Arc<TraceLogger>,
    pub emitter: EventEmitter,
    pub workspaces: WorkspaceManager,
    pub runner: R,
    pub clock: C,
    /// Backoff base; tests shrink it.
    pub backoff_base: Duration,
}

impl<R: AdapterRunner, C: Clock> StepExecutor<R, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifest: Arc<Manifest>,
        pipeline: Arc<PipelineSpec>,
        project_root: PathBuf,
        store: Arc<StateStore>,
        trace: Arc<TraceLogger>,
        emitter: EventEmitter,
        workspaces: WorkspaceManager,
        runner: R,
        clock: C,
    ) -> Self {
        Self {
            manifest,
            pipeline,
            project_root,
            store,
            trace,
            emitter,
            workspaces,
            runner,
            clock,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Run one step (or one matrix worker) to completion.
    ///
    /// `worker` is `(index, task)` for matrix workers; their artifacts
    /// register under the parent step's namespace as an indexed
    /// collection.
    pub async fn execute_step(
        &self,
        run: &Run,
        step: &StepDef,
        worker: Option<(usize, String)>,
        checkpoint: Option<Checkpoint>,
        force_cancel: watch::Receiver<bool>,
    ) -> Result<StepSuccess, EngineError> {
        let parent_id = StepId::new(&step.id);
        let step_id = match &worker {
            Some((index, _)) => parent_id.matrix_worker(*index),
            None => parent_id.clone(),
        };

        // 1. Cancellation check before any resource is acquired.
        if self.store.get_cancellation(&run.id).await?.is_some() {
            return Err(EngineError::Cancelled);
        }

        let persona = self.persona(step)?;
        let budget = retry_budget(step);
        let mut execution = StepExecution::new(run.id.clone(), step_id.clone());
        let mut repair: Option<String> = None;
        let mut warnings: Vec<String> = Vec::new();
        let mut tokens_peak: u64 = 0;

        loop {
            let attempt = execution.retry_count;

            // 2-3. Fresh workspace with mounts and injected artifacts.
            let task = worker.as_ref().map(|(_, t)| t.as_str());
            let vars = template_vars(run, step_id.as_str(), task);
            // Manifest-wide skill mounts land read-only ahead of the
            // step's own mounts.
            let mut mounts: Vec<wave_manifest::MountDef> = self
                .manifest
                .skill_mounts
                .iter()
                .map(|skill| wave_manifest::MountDef {
                    source: skill.source.display().to_string(),
                    target: skill.target.clone(),
                    mode: wave_manifest::MountMode::Readonly,
                })
                .collect();
            if let Some(workspace) = &step.workspace {
                mounts.extend(workspace.mount.iter().cloned());
            }
            let workspace = self.workspaces.create(
                run.id.as_str(),
                step_id.as_str(),
                attempt,
                &mounts,
                &vars,
                &self.project_root,
            )?;
            self.inject_artifacts(run, step, &workspace).await?;

            // 4-5. Prompt, with checkpoint prefix and any repair prompt.
            if let Some(cp) = &checkpoint {
                let doc = crate::checkpoint::generate_checkpoint(
                    &cp.title,
                    &cp.summary,
                    &cp.decisions,
                    self.clock.epoch_ms(),
                );
                std::fs::write(workspace.join(CHECKPOINT_FILE), doc)
                    .map_err(|e| EngineError::Workspace(format!("write checkpoint: {e}")))?;
            }
            let prompt = build_prompt(step, &vars, checkpoint.as_ref(), repair.as_deref());

            execution.start(workspace.clone(), self.clock.epoch_ms());
            self.persist_step(&execution).await?;
            if attempt == 0 {
                self.emit_step(run, &step_id, EventState::StepStarted, &step.persona, None, None)
                    .await?;
            }
            let _ = self.trace.append(
                self.clock.epoch_ms(),
                "step",
                &format!("{}/{} attempt {attempt} started", run.id, step_id),
            );

            // 6. Spawn via the adapter.
            let request = self.invocation_request(run, step, persona, &step_id, &workspace, prompt)?;
            let (usage_tx, mut usage_rx) = mpsc::channel(64);
            let signals = InvocationSignals {
                usage_tx: Some(usage_tx),
                cancel_rx: Some(force_cancel.clone()),
            };
            let started = self.clock.now();
            let result = self.runner.invoke(request, signals).await;
            while let Ok(total) = usage_rx.try_recv() {
                tokens_peak = tokens_peak.max(total);
            }

            match result {
                Ok(outcome) => {
                    tokens_peak = tokens_peak.max(outcome.usage.total());
                    warnings.extend(outcome.post_hook_warnings.iter().cloned());

                    // 7-8. Check declared outputs, then the contract.
                    match self.validate_outputs(step, &workspace).await {
                        Ok(ContractOutcome::Passed {
                            warnings: contract_warnings,
                            applied_fixes,
                        }) => {
                            warnings.extend(contract_warnings);
                            if !applied_fixes.is_empty() {
                                warnings.push(format!(
                                    "output recovered before validation: {}",
                                    applied_fixes.join(", ")
                                ));
                            }
                            if step.handover.is_some() {
                                self.emit_step(
                                    run,
                                    &step_id,
                                    EventState::ContractPassed,
                                    &step.persona,
                                    None,
                                    None,
                                )
                                .await?;
                            }

                            let artifact_names = self
                                .register_artifacts(run, step, &step_id, worker.as_ref(), &workspace)
                                .await?;

                            // 9. Final state, metric, completion event.
                            let total = outcome.usage.total();
                            execution.complete(total, self.clock.epoch_ms());
                            self.persist_step(&execution).await?;
                            self.store
                                .record_metric(&PerformanceMetric {
                                    run_id: run.id.clone(),
                                    step_id: step_id.clone(),
                                    pipeline_name: run.pipeline_name.clone(),
                                    persona: Some(step.persona.clone()),
                                    duration_ms: started.elapsed().as_millis() as u64,
                                    tokens_used: total,
                                    files_modified: 0,
                                    artifacts_generated: artifact_names.len() as u64,
                                })
                                .await?;
                            for warning in &warnings {
                                self.emit_step(
                                    run,
                                    &step_id,
                                    EventState::Warning,
                                    &step.persona,
                                    Some(warning.clone()),
                                    None,
                                )
                                .await?;
                            }
                            self.emit_completion(run, &step_id, &step.persona, total, &artifact_names, &execution)
                                .await?;

                            return Ok(StepSuccess {
                                step_id,
                                tokens: total,
                                tokens_peak,
                                artifact_names,
                                warnings,
                                transcript: outcome.result_text,
                                workspace,
                            });
                        }
                        Ok(ContractOutcome::Failed(failure)) => {
                            let must_pass = step
                                .handover
                                .as_ref()
                                .map(|h| h.contract.must_pass)
                                .unwrap_or(true);
                            self.emit_step(
                                run,
                                &step_id,
                                EventState::ContractFailed,
                                &step.persona,
                                Some(format!(
                                    "{}: {}",
                                    failure.kind.as_str(),
                                    failure
                                        .violations
                                        .iter()
                                        .map(|v| v.message.as_str())
                                        .collect::<Vec<_>>()
                                        .join("; ")
                                )),
                                None,
                            )
                            .await?;

                            if !must_pass {
                                // Soft failure: warn and carry on.
                                warnings.push(format!(
                                    "contract not met (advisory): {}",
                                    failure.kind.as_str()
                                ));
                                let artifact_names = self
                                    .register_artifacts(run, step, &step_id, worker.as_ref(), &workspace)
                                    .await?;
                                let total = outcome.usage.total();
                                execution.complete(total, self.clock.epoch_ms());
                                self.persist_step(&execution).await?;
                                self.emit_completion(
                                    run,
                                    &step_id,
                                    &step.persona,
                                    total,
                                    &artifact_names,
                                    &execution,
                                )
                                .await?;
                                return Ok(StepSuccess {
                                    step_id,
                                    tokens: total,
                                    tokens_peak,
                                    artifact_names,
                                    warnings,
                                    transcript: outcome.result_text,
                                    workspace,
                                });
                            }

                            if failure.retryable && attempt < budget {
                                repair = Some(failure.repair_prompt.clone());
                                self.begin_retry(run, step, &mut execution, &failure.repair_prompt)
                                    .await?;
                                continue;
                            }

                            execution.fail(
                                format!("contract failed: {}", failure.kind.as_str()),
                                self.clock.epoch_ms(),
                            );
                            self.persist_step(&execution).await?;
                            self.emit_step(
                                run,
                                &step_id,
                                EventState::StepFailed,
                                &step.persona,
                                execution.error.clone(),
                                None,
                            )
                            .await?;
                            return Err(EngineError::ContractFailed(failure));
                        }
                        Err(config_err) => {
                            execution.fail(config_err.to_string(), self.clock.epoch_ms());
                            self.persist_step(&execution).await?;
                            self.emit_step(
                                run,
                                &step_id,
                                EventState::StepFailed,
                                &step.persona,
                                Some(config_err.to_string()),
                                None,
                            )
                            .await?;
                            return Err(config_err);
                        }
                    }
                }
                Err(adapter_err) => {
                    let err = EngineError::from(adapter_err);

                    if matches!(err, EngineError::CancelledForce) {
                        execution.fail("cancelled by force", self.clock.epoch_ms());
                        self.persist_step(&execution).await?;
                        self.emit_step(
                            run,
                            &step_id,
                            EventState::StepFailed,
                            &step.persona,
                            Some("cancelled by force".to_string()),
                            None,
                        )
                        .await?;
                        return Err(EngineError::CancelledForce);
                    }

                    if err.is_retryable() && attempt < budget {
                        let generic =
                            "The previous attempt did not complete. Produce the declared output.";
                        repair = Some(format!("{generic}\nFailure: {err}"));
                        self.begin_retry(run, step, &mut execution, &err.to_string())
                            .await?;
                        continue;
                    }

                    execution.fail(err.to_string(), self.clock.epoch_ms());
                    self.persist_step(&execution).await?;
                    self.emit_step(
                        run,
                        &step_id,
                        EventState::StepFailed,
                        &step.persona,
                        Some(err.to_string()),
                        None,
                    )
                    .await?;
                    return Err(err);
                }
            }
        }
    }

    /// Record the retry transition, emit events, and back off.
    async fn begin_retry(
        &self,
        run: &Run,
        step: &StepDef,
        execution: &mut StepExecution,
        reason: &str,
    ) -> Result<(), EngineError> {
        execution.retry(reason);
        self.persist_step(execution).await?;
        let step_id = execution.step_id.clone();
        self.emit_step(
            run,
            &step_id,
            EventState::StepRetrying,
            &step.persona,
            Some(format!("attempt {} scheduled: {reason}", execution.retry_count)),
            None,
        )
        .await?;

        // Exponential backoff: base, 2x, 4x, ...
        let factor = 1u32 << (execution.retry_count.saturating_sub(1)).min(6);
        tokio::time::sleep(self.backoff_base * factor).await;
        Ok(())
    }

    fn persona(&self, step: &StepDef) -> Result<&PersonaDef, EngineError> {
        self.manifest.personas.get(&step.persona).ok_or_else(|| {
            EngineError::PipelineInvalid(format!("unknown persona {:?}", step.persona))
        })
    }

    /// Resolve injected artifacts from the store and copy them in.
    async fn inject_artifacts(
        &self,
        run: &Run,
        step: &StepDef,
        workspace: &std::path::Path,
    ) -> Result<(), EngineError> {
        if step.memory.inject_artifacts.is_empty() {
            return Ok(());
        }
        let mut items = Vec::new();
        for reference in &step.memory.inject_artifacts {
            let producer = StepId::new(&reference.step);
            let registered = self
                .store
                .list_artifacts(&run.id, Some(&producer))
                .await?;
            let record = registered
                .iter()
                .find(|a| a.name == reference.artifact)
                .ok_or_else(|| {
                    EngineError::Workspace(format!(
                        "artifact {:?} from step {:?} is not registered",
                        reference.artifact, reference.step
                    ))
                })?;
            items.push((
                reference.step.clone(),
                reference.injected_name().to_string(),
                record.path.clone(),
            ));
        }
        self.workspaces.inject_artifacts(workspace, &items)?;
        for (producer, name, path) in &items {
            let _ = self.trace.file_operation(
                self.clock.epoch_ms(),
                run.id.as_str(),
                step.id.as_str(),
                "inject",
                path,
            );
            tracing::debug!(%producer, %name, "artifact injected");
        }
        Ok(())
    }

    /// Build the adapter invocation request.
    fn invocation_request(
        &self,
        run: &Run,
        step: &StepDef,
        persona: &PersonaDef,
        step_id: &StepId,
        workspace: &std::path::Path,
        prompt: String,
    ) -> Result<InvocationRequest, EngineError> {
        let adapter = self
            .manifest
            .adapters
            .get(&persona.adapter)
            .ok_or_else(|| {
                EngineError::ManifestInvalid(format!("unknown adapter {:?}", persona.adapter))
            })?;

        let permissions = PermissionSet::from_patterns(
            &adapter.default_permissions.allowed_tools,
            &adapter.default_permissions.deny,
        )?
        .merge(PermissionSet::from_patterns(
            &persona.permissions.allowed_tools,
            &persona.permissions.deny,
        )?);

        let prompt_path = if persona.system_prompt_file.is_absolute() {
            persona.system_prompt_file.clone()
        } else {
            self.project_root.join(&persona.system_prompt_file)
        };
        let persona_prompt = std::fs::read_to_string(&prompt_path).map_err(|e| {
            EngineError::ManifestInvalid(format!(
                "persona prompt {} unreadable: {e}",
                prompt_path.display()
            ))
        })?;

        let contract_note = step.handover.as_ref().map(|h| {
            format!(
                "Your output is validated by a {} contract before hand-over; \
                 incomplete or malformed output fails the step.",
                h.contract.contract_type.as_str()
            )
        });
        let (sandbox_domains, passthrough) = match &persona.sandbox {
            Some(sandbox) => (sandbox.allowed_domains.clone(), sandbox.env_passthrough.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let system_prompt = build_system_prompt(
            &persona_prompt,
            &persona.permissions.deny,
            &sandbox_domains,
            contract_note.as_deref(),
        );

        let env = wave_adapters::curated_env(
            &passthrough,
            &[
                ("WAVE_RUN_ID".to_string(), run.id.to_string()),
                ("WAVE_STEP_ID".to_string(), step_id.to_string()),
            ],
        );

        let timeout_minutes = step
            .timeout_minutes
            .unwrap_or(self.manifest.runtime.default_timeout_minutes);

        let (pre_hooks, post_hooks) = match &persona.hooks {
            Some(hooks) => (hooks.pre_tool_use.clone(), hooks.post_tool_use.clone()),
            None => (Vec::new(), Vec::new()),
        };

        let project_files = adapter
            .project_files
            .iter()
            .map(|f| self.project_root.join(f))
            .collect();

        Ok(InvocationRequest {
            run_id: run.id.to_string(),
            step_id: step_id.to_string(),
            persona: step.persona.clone(),
            binary: adapter.binary.clone(),
            output_format: adapter.output_format.clone(),
            workspace: workspace.to_path_buf(),
            prompt,
            system_prompt,
            permissions,
            sandbox_domains,
            env,
            timeout: Duration::from_secs(timeout_minutes * 60),
            temperature: persona.temperature,
            max_turns: None,
            pre_hooks,
            post_hooks,
            project_files,
        })
    }

    /// Check declared outputs exist, then run the contract and gates.
    async fn validate_outputs(
        &self,
        step: &StepDef,
        workspace: &std::path::Path,
    ) -> Result<ContractOutcome, EngineError> {
        // Missing required outputs fail before the contract runs.
        for artifact in &step.output_artifacts {
            if artifact.required && !workspace.join(&artifact.path).exists() {
                let violation = wave_contract::Violation {
                    class: wave_contract::ViolationClass::MissingRequired,
                    path: artifact.path.display().to_string(),
                    message: format!(
                        "declared output {} was not produced",
                        artifact.path.display()
                    ),
                };
                let repair_prompt = format!(
                    "The declared output {} was not written. Produce it at exactly \
                     that path, relative to the working directory.",
                    artifact.path.display()
                );
                return Ok(ContractOutcome::Failed(wave_contract::ContractFailure {
                    kind: wave_contract::FailureKind::Schema,
                    violations: vec![violation],
                    retryable: true,
                    repair_prompt,
                }));
            }
        }

        let Some(handover) = &step.handover else {
            return Ok(ContractOutcome::passed());
        };

        // Subject: declared json artifact for schema contracts.
        let subject = step
            .output_artifacts
            .iter()
            .find(|a| a.artifact_type == wave_core::ArtifactType::Json)
            .map(|a| a.path.clone());

        let request = ValidationRequest {
            contract: &handover.contract,
            gates: &handover.quality_gates,
            workspace,
            subject,
        };
        Ok(wave_contract::validate(&request).await?)
    }

    /// Register declared outputs on disk and in the artifact table.
    async fn register_artifacts(
        &self,
        run: &Run,
        step: &StepDef,
        step_id: &StepId,
        worker: Option<&(usize, String)>,
        workspace: &std::path::Path,
    ) -> Result<Vec<String>, EngineError> {
        let mut names = Vec::new();
        for declared in &step.output_artifacts {
            let path = workspace.join(&declared.path);
            if !path.exists() {
                // Optional and absent.
                continue;
            }
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            // Matrix workers aggregate under the parent namespace.
            let (owner, name) = match worker {
                Some((index, _)) => (StepId::new(&step.id), format!("{}[{index}]", declared.name)),
                None => (step_id.clone(), declared.name.clone()),
            };

            let record = ArtifactRecord {
                run_id: run.id.clone(),
                step_id: owner,
                name: name.clone(),
                path: path.clone(),
                artifact_type: declared.artifact_type,
                size_bytes: size,
                created_at_ms: self.clock.epoch_ms(),
            };
            self.store.insert_artifact(&record).await?;
            let _ = self.trace.file_operation(
                self.clock.epoch_ms(),
                run.id.as_str(),
                step_id.as_str(),
                "register",
                &path,
            );
            names.push(name);
        }
        Ok(names)
    }

    async fn persist_step(&self, execution: &StepExecution) -> Result<(), EngineError> {
        self.store.upsert_step(execution).await?;
        self.store
            .upsert_step_progress(
                &execution.run_id,
                &execution.step_id,
                execution.state,
                execution.error.as_deref(),
                self.clock.epoch_ms(),
            )
            .await?;
        Ok(())
    }

    async fn emit_step(
        &self,
        run: &Run,
        step_id: &StepId,
        state: EventState,
        persona: &str,
        message: Option<String>,
        tokens: Option<u64>,
    ) -> Result<(), EngineError> {
        let mut event = ProgressEvent::new(self.clock.epoch_ms(), run.id.clone(), state)
            .with_step(step_id.clone())
            .with_duration(run.duration_ms(self.clock.epoch_ms()))
            .with_persona(persona);
        if let Some(message) = message {
            event = event.with_message(message);
        }
        if let Some(tokens) = tokens {
            event = event.with_tokens(tokens);
        }
        self.emitter.emit(event).await
    }

    async fn emit_completion(
        &self,
        run: &Run,
        step_id: &StepId,
        persona: &str,
        tokens: u64,
        artifact_names: &[String],
        execution: &StepExecution,
    ) -> Result<(), EngineError> {
        let event = ProgressEvent::new(self.clock.epoch_ms(), run.id.clone(), EventState::StepCompleted)
            .with_step(step_id.clone())
            .with_duration(execution.duration_ms(self.clock.epoch_ms()))
            .with_persona(persona)
            .with_tokens(tokens)
            .with_artifacts(artifact_names.to_vec());
        self.emitter.emit(event).await
    }
}

/// Retry budget: the contract's `max_retries` when a hand-over is
/// declared, else the step's own budget.
fn retry_budget(step: &StepDef) -> u32 {
    match &step.handover {
        Some(handover) => handover.contract.max_retries,
        None => step.max_retries.unwrap_or(0),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
