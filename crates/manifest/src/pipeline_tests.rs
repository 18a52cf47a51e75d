// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wave_core::ArtifactType;

const PIPELINE_YAML: &str = r#"
kind: Pipeline
metadata:
  name: hello
  description: Linear two-step pipeline
input:
  source: cli
steps:
  - id: a
    persona: builder
    exec:
      type: prompt
      source: "Analyze {input} and emit out.json"
    output_artifacts:
      - name: out
        path: out.json
        type: json
    handover:
      contract:
        type: structural-schema
        schema:
          type: object
          required: [severity]
        max_retries: 2
        recovery_level: progressive
      quality_gates:
        - type: required-fields
          required: true
          parameters:
            fields: [severity]
  - id: b
    persona: builder
    dependencies: [a]
    memory:
      strategy: fresh
      inject_artifacts:
        - step: a
          artifact: out
          as: analysis
    workspace:
      mount:
        - source: "src"
          target: "src"
          mode: readonly
    exec:
      type: prompt
      source: "Summarize {input}"
    output_artifacts:
      - name: summary
        path: summary.md
        type: markdown
        required: false
"#;

#[test]
fn pipeline_yaml_parses_fully() {
    let p: PipelineSpec = serde_yaml::from_str(PIPELINE_YAML).unwrap();

    assert_eq!(p.kind, "Pipeline");
    assert_eq!(p.name(), "hello");
    assert_eq!(p.steps.len(), 2);

    let a = p.step("a").unwrap();
    let handover = a.handover.as_ref().unwrap();
    assert_eq!(handover.contract.contract_type, ContractType::StructuralSchema);
    assert_eq!(handover.contract.max_retries, 2);
    assert!(handover.contract.must_pass); // defaulted
    assert_eq!(handover.contract.recovery_level, RecoveryLevel::Progressive);
    assert_eq!(handover.quality_gates.len(), 1);
    assert_eq!(handover.quality_gates[0].gate_type, "required-fields");

    assert_eq!(a.output_artifacts[0].artifact_type, ArtifactType::Json);
    assert!(a.output_artifacts[0].required); // defaulted
}

#[test]
fn memory_and_mounts_parse() {
    let p: PipelineSpec = serde_yaml::from_str(PIPELINE_YAML).unwrap();
    let b = p.step("b").unwrap();

    assert_eq!(b.dependencies, vec!["a"]);
    assert_eq!(b.memory.strategy, MemoryStrategy::Fresh);
    let inject = &b.memory.inject_artifacts[0];
    assert_eq!(inject.step, "a");
    assert_eq!(inject.injected_name(), "analysis");

    let mount = &b.workspace.as_ref().unwrap().mount[0];
    assert_eq!(mount.source, "src");
    assert_eq!(mount.mode, MountMode::Readonly);

    assert!(!b.output_artifacts[0].required);
}

#[test]
fn injected_name_defaults_to_artifact() {
    let r = ArtifactRef {
        step: "a".to_string(),
        artifact: "out".to_string(),
        alias: None,
    };
    assert_eq!(r.injected_name(), "out");
}

#[test]
fn contract_type_kebab_case_round_trip() {
    for (text, kind) in [
        ("structural-schema", ContractType::StructuralSchema),
        ("typed-source", ContractType::TypedSource),
        ("test-suite", ContractType::TestSuite),
        ("document-structure", ContractType::DocumentStructure),
    ] {
        let parsed: ContractType =
            serde_yaml::from_str(&format!("\"{}\"", text)).unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(kind.as_str(), text);
    }
}

#[test]
fn matrix_strategy_parses() {
    let yaml = r#"
kind: Pipeline
metadata: { name: fanout }
steps:
  - id: work
    persona: builder
    exec: { type: prompt, source: "Handle {task}" }
    strategy:
      matrix:
        tasks: [alpha, beta, gamma]
"#;
    let p: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
    let matrix = &p.steps[0].strategy.as_ref().unwrap().matrix;
    assert_eq!(matrix.tasks, vec!["alpha", "beta", "gamma"]);
    assert!(matrix.from_input.is_none());
}
