// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline file model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wave_core::ArtifactType;

/// Top-level pipeline document (`kind: Pipeline`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub kind: String,
    pub metadata: crate::manifest::Metadata,
    #[serde(default)]
    pub input: InputSpec,
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

impl PipelineSpec {
    /// Pipeline name (from metadata).
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// How the external invocation's payload resolves into template variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub label_filter: Option<String>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

/// One unit of work in the DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    /// Unique within the pipeline.
    pub id: String,
    /// Persona reference (must be declared in the manifest).
    pub persona: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub memory: MemoryPolicy,
    #[serde(default)]
    pub workspace: Option<WorkspaceConfig>,
    pub exec: ExecDef,
    #[serde(default)]
    pub output_artifacts: Vec<OutputArtifactDef>,
    #[serde(default)]
    pub handover: Option<HandoverDef>,
    #[serde(default)]
    pub strategy: Option<StrategyDef>,
    /// Per-step timeout override; falls back to the manifest default.
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
    /// Retry budget for adapter-level failures without a contract.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Memory policy: what earlier context a step starts from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryPolicy {
    #[serde(default)]
    pub strategy: MemoryStrategy,
    #[serde(default)]
    pub inject_artifacts: Vec<ArtifactRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStrategy {
    /// Start from a clean context.
    #[default]
    Fresh,
    /// Inherit the upstream checkpoint, if one exists.
    Inherit,
}

/// Reference to an artifact produced by a dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Producing step id.
    pub step: String,
    /// Logical artifact name on that step.
    pub artifact: String,
    /// Alias under which to inject; defaults to the artifact name.
    #[serde(default, rename = "as")]
    pub alias: Option<String>,
}

impl ArtifactRef {
    /// Name the artifact is injected under.
    pub fn injected_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.artifact)
    }
}

/// Workspace mounts for a step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub mount: Vec<MountDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountDef {
    /// Source path, relative to the project root; supports `{var}` substitution.
    pub source: String,
    /// Target directory inside the workspace.
    pub target: PathBuf,
    #[serde(default)]
    pub mode: MountMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    #[default]
    Readonly,
    Readwrite,
}

/// Execution descriptor: the prompt template driving the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecDef {
    #[serde(rename = "type", default = "default_exec_type")]
    pub exec_type: String,
    /// Prompt template text, or a path when `type: prompt_file`.
    pub source: String,
}

fn default_exec_type() -> String {
    "prompt".to_string()
}

/// Declared output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifactDef {
    /// Logical name, unique within the step.
    pub name: String,
    /// Path relative to the step workspace.
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub artifact_type: ArtifactType,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Hand-over gate declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverDef {
    pub contract: ContractDef,
    #[serde(default)]
    pub quality_gates: Vec<QualityGateDef>,
}

/// Contract kinds form a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractType {
    StructuralSchema,
    TypedSource,
    TestSuite,
    DocumentStructure,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::StructuralSchema => "structural-schema",
            ContractType::TypedSource => "typed-source",
            ContractType::TestSuite => "test-suite",
            ContractType::DocumentStructure => "document-structure",
        }
    }
}

/// JSON recovery escalation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryLevel {
    #[default]
    Conservative,
    Progressive,
    Aggressive,
}

/// Contract configuration for a step's hand-over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDef {
    #[serde(rename = "type")]
    pub contract_type: ContractType,
    /// On-disk schema for structural-schema contracts.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
    /// Inline schema; wins over `schema_path` when both are set.
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    /// Command line for test-suite contracts.
    #[serde(default)]
    pub command: Option<String>,
    /// Source file for typed-source and document-structure contracts.
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Required section headings for document-structure contracts.
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default = "default_must_pass")]
    pub must_pass: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub on_failure: Option<String>,
    #[serde(default = "default_allow_recovery")]
    pub allow_recovery: bool,
    #[serde(default)]
    pub recovery_level: RecoveryLevel,
    /// Downgrade post-recovery schema failures to warnings.
    #[serde(default)]
    pub progressive_validation: bool,
    #[serde(default)]
    pub disable_wrapper_detection: bool,
}

fn default_must_pass() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_allow_recovery() -> bool {
    true
}

/// Composable quality gate on top of the primary contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateDef {
    #[serde(rename = "type")]
    pub gate_type: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Fan-out strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDef {
    pub matrix: MatrixDef,
}

/// Matrix fan-out over an input collection.
///
/// Exactly one of `tasks` (inline list) or `from_input` (name of an input
/// field holding the collection) should be set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixDef {
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub from_input: Option<String>,
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
