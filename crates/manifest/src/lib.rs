// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-manifest: manifest and pipeline data structures
//!
//! The engine consumes these as plain data; this crate owns the serde
//! model, YAML loading, `{variable}` interpolation, cross-reference
//! validation, and the pipeline DAG checks.

pub mod dag;
pub mod loader;
pub mod manifest;
pub mod pipeline;
pub mod template;
pub mod validate;

pub use dag::{ready_steps, topological_order, validate_dag, DagError};
pub use loader::{load_manifest, load_pipeline};
pub use manifest::{
    AdapterDef, AuditSettings, HooksDef, Manifest, Metadata, PermissionPatterns, PersonaDef,
    RelaySettings, RoutingConfig, RoutingRule, RuntimeConfig, SandboxDef, SkillMount,
};
pub use pipeline::{
    ArtifactRef, ContractDef, ContractType, ExecDef, HandoverDef, InputSpec, MatrixDef,
    MemoryPolicy, MemoryStrategy, MountDef, MountMode, OutputArtifactDef, PipelineSpec,
    QualityGateDef, RecoveryLevel, StepDef, StrategyDef,
};
pub use template::{interpolate, VAR_PATTERN};
pub use validate::validate_pipeline;

use thiserror::Error;

/// Errors raised while loading or validating manifest and pipeline files.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid manifest at {location}: {message}")]
    ManifestInvalid { location: String, message: String },
    #[error("invalid pipeline at {location}: {message}")]
    PipelineInvalid { location: String, message: String },
    #[error(transparent)]
    Dag(#[from] DagError),
}
