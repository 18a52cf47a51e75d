// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::events::EventEmitter;
use wave_core::Clock;
use crate::executor::StepExecutor;
use crate::registry::RunRegistry;
use crate::relay::RelayConfig;
use crate::scheduler::PipelineScheduler;
use crate::workspace::WorkspaceManager;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wave_adapters::FakeRunner;
use wave_core::{FakeClock, Run, RunId};
use wave_manifest::{
    AdapterDef, ContractDef, ContractType, ExecDef, HandoverDef, InputSpec, Manifest,
    MemoryPolicy, Metadata, OutputArtifactDef, PermissionPatterns, PersonaDef, PipelineSpec,
    RecoveryLevel, StepDef,
};
use wave_storage::{StateStore, TraceLogger};

/// Everything an engine test needs, rooted in two temp dirs.
pub struct TestHarness {
    pub data: TempDir,
    pub project: TempDir,
    pub store: Arc<StateStore>,
    pub trace: Arc<TraceLogger>,
    pub runner: FakeRunner,
    pub clock: FakeClock,
    pub manifest: Arc<Manifest>,
    pub registry: RunRegistry,
}

impl TestHarness {
    pub async fn new() -> Self {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let manifest = manifest_fixture(project.path());

        let store = Arc::new(StateStore::open(data.path()).await.unwrap());
        let trace = Arc::new(
            TraceLogger::create(&data.path().join("traces"), 1_000, true, true).unwrap(),
        );

        Self {
            data,
            project,
            store,
            trace,
            runner: FakeRunner::new(),
            clock: FakeClock::default(),
            manifest: Arc::new(manifest),
            registry: RunRegistry::new(),
        }
    }

    pub fn workspaces(&self) -> WorkspaceManager {
        WorkspaceManager::new(self.data.path().join("workspaces"))
    }

    pub fn emitter(&self) -> EventEmitter {
        EventEmitter::new(
            Arc::clone(&self.store),
            Some(self.data.path().join("events")),
        )
    }

    /// Executor with a 1ms backoff base so retry tests stay fast.
    pub fn executor(&self, pipeline: PipelineSpec) -> Arc<StepExecutor<FakeRunner, FakeClock>> {
        let mut executor = StepExecutor::new(
            Arc::clone(&self.manifest),
            Arc::new(pipeline),
            self.project.path().to_path_buf(),
            Arc::clone(&self.store),
            Arc::clone(&self.trace),
            self.emitter(),
            self.workspaces(),
            self.runner.clone(),
            self.clock.clone(),
        );
        executor.backoff_base = Duration::from_millis(1);
        Arc::new(executor)
    }

    pub fn scheduler(
        &self,
        pipeline: PipelineSpec,
    ) -> PipelineScheduler<FakeRunner, FakeClock> {
        let relay = RelayConfig::from(&self.manifest.runtime.relay);
        PipelineScheduler::new(
            self.executor(pipeline),
            self.registry.clone(),
            relay,
            self.manifest.runtime.max_concurrent_workers,
        )
    }

    /// Insert a pending run and return it.
    pub async fn seed_run(&self, id: &str, pipeline_name: &str) -> Run {
        let run = Run::new(
            RunId::new(id),
            pipeline_name,
            serde_json::json!({"issue": 7}),
            self.clock.epoch_ms(),
        );
        self.store.insert_run(&run, "test-hash").await.unwrap();
        run
    }
}

/// Manifest with a claude adapter, a builder persona, and a summarizer.
pub fn manifest_fixture(project_root: &Path) -> Manifest {
    std::fs::create_dir_all(project_root.join("personas")).unwrap();
    std::fs::write(
        project_root.join("personas/builder.md"),
        "You are the builder persona.\n",
    )
    .unwrap();

    let mut manifest = Manifest {
        metadata: Metadata {
            name: "test-project".to_string(),
            description: String::new(),
        },
        adapters: Default::default(),
        personas: Default::default(),
        runtime: Default::default(),
        skill_mounts: Vec::new(),
    };
    manifest.adapters.insert(
        "claude".to_string(),
        AdapterDef {
            binary: "claude".to_string(),
            mode: "headless".to_string(),
            output_format: "stream-json".to_string(),
            project_files: Vec::new(),
            default_permissions: PermissionPatterns {
                allowed_tools: vec!["Read".to_string(), "Write".to_string()],
                deny: vec!["WebFetch".to_string()],
            },
            hooks_template_dir: None,
        },
    );
    manifest.personas.insert(
        "builder".to_string(),
        PersonaDef {
            adapter: "claude".to_string(),
            system_prompt_file: "personas/builder.md".into(),
            temperature: 0.2,
            permissions: PermissionPatterns::default(),
            hooks: None,
            sandbox: None,
        },
    );
    manifest.runtime.relay.summarizer_persona = Some("builder".to_string());
    manifest
}

/// Bare step builder.
pub fn step(id: &str) -> StepDef {
    StepDef {
        id: id.to_string(),
        persona: "builder".to_string(),
        dependencies: Vec::new(),
        memory: MemoryPolicy::default(),
        workspace: None,
        exec: ExecDef {
            exec_type: "prompt".to_string(),
            source: format!("Work on {{input}} in step {id}"),
        },
        output_artifacts: Vec::new(),
        handover: None,
        strategy: None,
        timeout_minutes: None,
        max_retries: None,
    }
}

/// Add a dependency list.
pub fn with_deps(mut step: StepDef, deps: &[&str]) -> StepDef {
    step.dependencies = deps.iter().map(|d| d.to_string()).collect();
    step
}

/// Declare one json output artifact.
pub fn with_json_output(mut step: StepDef, name: &str, path: &str) -> StepDef {
    step.output_artifacts.push(OutputArtifactDef {
        name: name.to_string(),
        path: path.into(),
        artifact_type: wave_core::ArtifactType::Json,
        required: true,
    });
    step
}

/// Declare a markdown output artifact.
pub fn with_md_output(mut step: StepDef, name: &str, path: &str, required: bool) -> StepDef {
    step.output_artifacts.push(OutputArtifactDef {
        name: name.to_string(),
        path: path.into(),
        artifact_type: wave_core::ArtifactType::Markdown,
        required,
    });
    step
}

/// Attach a structural-schema contract.
pub fn with_schema_contract(
    mut step: StepDef,
    schema: serde_json::Value,
    max_retries: u32,
) -> StepDef {
    step.handover = Some(HandoverDef {
        contract: ContractDef {
            contract_type: ContractType::StructuralSchema,
            schema_path: None,
            schema: Some(schema),
            command: None,
            source: None,
            sections: Vec::new(),
            must_pass: true,
            max_retries,
            on_failure: None,
            allow_recovery: true,
            recovery_level: RecoveryLevel::Conservative,
            progressive_validation: false,
            disable_wrapper_detection: false,
        },
        quality_gates: Vec::new(),
    });
    step
}

/// Pipeline wrapper.
pub fn pipeline(name: &str, steps: Vec<StepDef>) -> PipelineSpec {
    PipelineSpec {
        kind: "Pipeline".to_string(),
        metadata: Metadata {
            name: name.to_string(),
            description: String::new(),
        },
        input: InputSpec::default(),
        steps,
    }
}

/// Schema requiring `severity ∈ {low, med, high}` (scenario S2).
pub fn severity_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["severity"],
        "properties": {
            "severity": {"type": "string", "enum": ["low", "med", "high"]}
        }
    })
}
