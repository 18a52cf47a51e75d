// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dag::DagError;
use crate::manifest::{AdapterDef, Metadata, PersonaDef, PermissionPatterns};
use crate::pipeline::{
    ArtifactRef, ContractDef, ExecDef, HandoverDef, InputSpec, MemoryPolicy, MemoryStrategy,
    OutputArtifactDef, PipelineSpec, StepDef,
};
use serde_json::json;
use std::path::PathBuf;

fn manifest() -> Manifest {
    let mut m = Manifest {
        metadata: Metadata {
            name: "proj".to_string(),
            description: String::new(),
        },
        adapters: Default::default(),
        personas: Default::default(),
        runtime: Default::default(),
        skill_mounts: Vec::new(),
    };
    m.adapters.insert(
        "claude".to_string(),
        AdapterDef {
            binary: "claude".to_string(),
            mode: "headless".to_string(),
            output_format: "stream-json".to_string(),
            project_files: Vec::new(),
            default_permissions: PermissionPatterns::default(),
            hooks_template_dir: None,
        },
    );
    m.personas.insert(
        "builder".to_string(),
        PersonaDef {
            adapter: "claude".to_string(),
            system_prompt_file: PathBuf::from("personas/builder.md"),
            temperature: 0.7,
            permissions: PermissionPatterns::default(),
            hooks: None,
            sandbox: None,
        },
    );
    m
}

fn step(id: &str) -> StepDef {
    StepDef {
        id: id.to_string(),
        persona: "builder".to_string(),
        dependencies: Vec::new(),
        memory: MemoryPolicy::default(),
        workspace: None,
        exec: ExecDef {
            exec_type: "prompt".to_string(),
            source: "do {input}".to_string(),
        },
        output_artifacts: Vec::new(),
        handover: None,
        strategy: None,
        timeout_minutes: None,
        max_retries: None,
    }
}

fn pipeline(steps: Vec<StepDef>) -> PipelineSpec {
    PipelineSpec {
        kind: "Pipeline".to_string(),
        metadata: Metadata {
            name: "hello".to_string(),
            description: String::new(),
        },
        input: InputSpec::default(),
        steps,
    }
}

fn schema_contract() -> ContractDef {
    ContractDef {
        contract_type: ContractType::StructuralSchema,
        schema_path: None,
        schema: Some(json!({"type": "object"})),
        command: None,
        source: None,
        sections: Vec::new(),
        must_pass: true,
        max_retries: 2,
        on_failure: None,
        allow_recovery: true,
        recovery_level: Default::default(),
        progressive_validation: false,
        disable_wrapper_detection: false,
    }
}

#[test]
fn minimal_pipeline_validates() {
    assert!(validate_pipeline(&pipeline(vec![step("a")]), &manifest()).is_ok());
}

#[test]
fn wrong_kind_is_rejected() {
    let mut p = pipeline(vec![step("a")]);
    p.kind = "Job".to_string();
    let err = validate_pipeline(&p, &manifest()).unwrap_err();
    assert!(matches!(err, ManifestError::PipelineInvalid { .. }));
}

#[test]
fn unknown_persona_is_rejected() {
    let mut s = step("a");
    s.persona = "ghost".to_string();
    let err = validate_pipeline(&pipeline(vec![s]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn persona_with_unknown_adapter_is_rejected() {
    let mut m = manifest();
    if let Some(p) = m.personas.get_mut("builder") {
        p.adapter = "missing".to_string();
    }
    let err = validate_pipeline(&pipeline(vec![step("a")]), &m).unwrap_err();
    assert!(matches!(err, ManifestError::ManifestInvalid { .. }));
}

#[test]
fn non_headless_adapter_is_rejected() {
    let mut m = manifest();
    if let Some(a) = m.adapters.get_mut("claude") {
        a.mode = "interactive".to_string();
    }
    let err = validate_pipeline(&pipeline(vec![step("a")]), &m).unwrap_err();
    assert!(err.to_string().contains("headless"));
}

#[test]
fn duplicate_artifact_names_are_rejected() {
    let mut s = step("a");
    s.output_artifacts = vec![
        OutputArtifactDef {
            name: "out".to_string(),
            path: PathBuf::from("out.json"),
            artifact_type: wave_core::ArtifactType::Json,
            required: true,
        },
        OutputArtifactDef {
            name: "out".to_string(),
            path: PathBuf::from("other.json"),
            artifact_type: wave_core::ArtifactType::Json,
            required: true,
        },
    ];
    let err = validate_pipeline(&pipeline(vec![s]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("duplicate artifact name"));
}

#[test]
fn schema_contract_requires_json_artifact() {
    let mut s = step("a");
    s.handover = Some(HandoverDef {
        contract: schema_contract(),
        quality_gates: Vec::new(),
    });
    // No output artifacts at all -> rejected
    let err = validate_pipeline(&pipeline(vec![s.clone()]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("json output artifact"));

    // With a json artifact -> passes
    s.output_artifacts = vec![OutputArtifactDef {
        name: "out".to_string(),
        path: PathBuf::from("out.json"),
        artifact_type: wave_core::ArtifactType::Json,
        required: true,
    }];
    assert!(validate_pipeline(&pipeline(vec![s]), &manifest()).is_ok());
}

#[test]
fn schema_contract_without_schema_is_rejected() {
    let mut s = step("a");
    let mut contract = schema_contract();
    contract.schema = None;
    s.handover = Some(HandoverDef {
        contract,
        quality_gates: Vec::new(),
    });
    let err = validate_pipeline(&pipeline(vec![s]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("schema or schema_path"));
}

#[test]
fn inject_from_non_dependency_is_rejected() {
    let producer = {
        let mut s = step("a");
        s.output_artifacts = vec![OutputArtifactDef {
            name: "out".to_string(),
            path: PathBuf::from("out.json"),
            artifact_type: wave_core::ArtifactType::Json,
            required: true,
        }];
        s
    };
    let mut consumer = step("b");
    // No dependency on "a" declared
    consumer.memory = MemoryPolicy {
        strategy: MemoryStrategy::Fresh,
        inject_artifacts: vec![ArtifactRef {
            step: "a".to_string(),
            artifact: "out".to_string(),
            alias: None,
        }],
    };
    let err = validate_pipeline(&pipeline(vec![producer, consumer]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("not a dependency"));
}

#[test]
fn inject_of_undeclared_artifact_is_rejected() {
    let producer = step("a");
    let mut consumer = step("b");
    consumer.dependencies = vec!["a".to_string()];
    consumer.memory = MemoryPolicy {
        strategy: MemoryStrategy::Inherit,
        inject_artifacts: vec![ArtifactRef {
            step: "a".to_string(),
            artifact: "missing".to_string(),
            alias: None,
        }],
    };
    let err = validate_pipeline(&pipeline(vec![producer, consumer]), &manifest()).unwrap_err();
    assert!(err.to_string().contains("no artifact named"));
}

#[test]
fn cycle_is_reported_through_dag_error() {
    let mut a = step("a");
    a.dependencies = vec!["b".to_string()];
    let mut b = step("b");
    b.dependencies = vec!["a".to_string()];
    let err = validate_pipeline(&pipeline(vec![a, b]), &manifest()).unwrap_err();
    assert!(matches!(err, ManifestError::Dag(DagError::Cycle { .. })));
}

#[test]
fn zero_workers_is_rejected() {
    let mut m = manifest();
    m.runtime.max_concurrent_workers = 0;
    let err = validate_pipeline(&pipeline(vec![step("a")]), &m).unwrap_err();
    assert!(err.to_string().contains("at least 1"));
}

#[test]
fn routing_must_reference_known_personas() {
    let mut m = manifest();
    m.runtime.routing.default = Some("ghost".to_string());
    let err = validate_pipeline(&pipeline(vec![step("a")]), &m).unwrap_err();
    assert!(matches!(err, ManifestError::ManifestInvalid { .. }));
}
