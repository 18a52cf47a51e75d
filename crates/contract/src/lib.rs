// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-contract: hand-over contract validation
//!
//! A contract gates a step's output before downstream steps may consume
//! it. Four primary kinds (structural-schema, typed-source, test-suite,
//! document-structure) plus composable quality gates. Schema contracts get
//! a JSON recovery staircase and failure classification that feeds repair
//! prompts for the retry loop.

pub mod classify;
pub mod command;
pub mod document;
pub mod gates;
pub mod recovery;
pub mod schema;

pub use classify::{build_repair_prompt, classify_violation, ViolationClass};
pub use gates::{evaluate_gates, GateResult};
pub use recovery::{recover_json, RecoveryOutcome};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wave_manifest::{ContractDef, ContractType, QualityGateDef};

/// Configuration errors raised before any validation runs.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("contract misconfigured: {0}")]
    Misconfigured(String),
    #[error("schema invalid: {0}")]
    SchemaInvalid(String),
    #[error("subject file not found: {0}")]
    SubjectMissing(PathBuf),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sub-classification of a contract failure, carried on events and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Schema,
    Compile,
    Test,
    Document,
    QualityGate,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Schema => "schema",
            FailureKind::Compile => "compile",
            FailureKind::Test => "test",
            FailureKind::Document => "document",
            FailureKind::QualityGate => "quality-gate",
        }
    }
}

/// A single contract violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub class: ViolationClass,
    /// Dotted or JSON-pointer-ish location of the offending value.
    pub path: String,
    pub message: String,
}

/// A failed validation, with everything the retry loop needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFailure {
    pub kind: FailureKind,
    pub violations: Vec<Violation>,
    /// Whether a retry with a repair prompt could plausibly fix this.
    pub retryable: bool,
    /// Prompt fragment describing the violations and the minimal change
    /// required, appended to the step prompt on retry.
    pub repair_prompt: String,
}

/// Result of running a contract against a step's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContractOutcome {
    Passed {
        /// Soft findings (recovery warnings, downgraded schema failures,
        /// advisory gate misses).
        warnings: Vec<String>,
        /// JSON recovery fixes that were applied to make the subject parse.
        applied_fixes: Vec<String>,
    },
    Failed(ContractFailure),
}

impl ContractOutcome {
    pub fn passed() -> Self {
        ContractOutcome::Passed {
            warnings: Vec::new(),
            applied_fixes: Vec::new(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ContractOutcome::Passed { .. })
    }
}

/// What the contract validates against.
#[derive(Debug, Clone)]
pub struct ValidationRequest<'a> {
    pub contract: &'a ContractDef,
    pub gates: &'a [QualityGateDef],
    /// Step workspace; command contracts run here.
    pub workspace: &'a Path,
    /// Primary document: the declared json artifact for structural-schema,
    /// overriding the contract's own `source` when set.
    pub subject: Option<PathBuf>,
}

impl<'a> ValidationRequest<'a> {
    /// Resolve the subject path relative to the workspace.
    pub(crate) fn subject_path(&self) -> Option<PathBuf> {
        let rel = self
            .subject
            .clone()
            .or_else(|| self.contract.source.clone())?;
        if rel.is_absolute() {
            Some(rel)
        } else {
            Some(self.workspace.join(rel))
        }
    }
}

/// Validate a step's output against its contract and quality gates.
///
/// Primary contract first; quality gates only run when it passes (their
/// findings compose onto the primary result). Errors are reserved for
/// misconfiguration; ordinary validation failures come back as
/// [`ContractOutcome::Failed`].
pub async fn validate(req: &ValidationRequest<'_>) -> Result<ContractOutcome, ContractError> {
    let outcome = match req.contract.contract_type {
        ContractType::StructuralSchema => schema::validate_schema(req)?,
        ContractType::TypedSource => command::validate_typed_source(req).await?,
        ContractType::TestSuite => command::validate_test_suite(req).await?,
        ContractType::DocumentStructure => document::validate_document(req)?,
    };

    let (mut warnings, applied_fixes) = match outcome {
        ContractOutcome::Failed(failure) => return Ok(ContractOutcome::Failed(failure)),
        ContractOutcome::Passed {
            warnings,
            applied_fixes,
        } => (warnings, applied_fixes),
    };

    if !req.gates.is_empty() {
        let results = gates::evaluate_gates(req).await?;
        let mut violations = Vec::new();
        for result in results {
            if result.passed {
                continue;
            }
            if result.required {
                violations.push(Violation {
                    class: ViolationClass::Other,
                    path: result.gate.clone(),
                    message: result.detail.clone(),
                });
            } else {
                warnings.push(format!("gate {} not met: {}", result.gate, result.detail));
            }
        }
        if !violations.is_empty() {
            let repair_prompt = classify::build_repair_prompt(&violations, &applied_fixes, None);
            return Ok(ContractOutcome::Failed(ContractFailure {
                kind: FailureKind::QualityGate,
                violations,
                retryable: true,
                repair_prompt,
            }));
        }
    }

    Ok(ContractOutcome::Passed {
        warnings,
        applied_fixes,
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
