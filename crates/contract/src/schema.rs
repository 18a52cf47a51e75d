// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural-schema contract validation.

use crate::classify::{build_repair_prompt, classify_violation};
use crate::recovery::recover_json;
use crate::{ContractError, ContractFailure, ContractOutcome, FailureKind, ValidationRequest, Violation};
use serde_json::Value;

/// Validate the subject document against the contract's JSON schema.
///
/// Parse failures go through the recovery staircase when enabled; a
/// post-recovery schema failure is downgraded to a warning when
/// `progressive_validation` is set.
pub fn validate_schema(req: &ValidationRequest<'_>) -> Result<ContractOutcome, ContractError> {
    let contract = req.contract;

    let schema = load_schema(req)?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| ContractError::SchemaInvalid(e.to_string()))?;

    let subject_path = req
        .subject_path()
        .ok_or_else(|| ContractError::Misconfigured("schema contract has no subject".to_string()))?;
    if !subject_path.exists() {
        return Ok(ContractOutcome::Failed(ContractFailure {
            kind: FailureKind::Schema,
            violations: vec![Violation {
                class: crate::ViolationClass::Other,
                path: String::new(),
                message: format!("declared output {} was not produced", subject_path.display()),
            }],
            retryable: true,
            repair_prompt: format!(
                "The declared output file {} was not produced. \
                 Write the file with content matching the declared schema.",
                subject_path.display()
            ),
        }));
    }
    let raw = std::fs::read_to_string(&subject_path).map_err(|source| ContractError::Io {
        path: subject_path.clone(),
        source,
    })?;

    let mut warnings = Vec::new();
    let mut applied_fixes = Vec::new();

    let document: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(parse_err) if contract.allow_recovery => {
            let outcome = recover_json(
                &raw,
                contract.recovery_level,
                !contract.disable_wrapper_detection,
            );
            warnings.extend(outcome.warnings);
            applied_fixes.extend(outcome.fixes);
            match outcome.value {
                Some(value) => {
                    tracing::debug!(
                        subject = %subject_path.display(),
                        fixes = applied_fixes.len(),
                        "recovered malformed JSON"
                    );
                    value
                }
                None => {
                    return Ok(parse_failure(&parse_err.to_string(), &applied_fixes));
                }
            }
        }
        Err(parse_err) => {
            return Ok(parse_failure(&parse_err.to_string(), &applied_fixes));
        }
    };

    let collect_violations = |doc: &Value| -> Vec<Violation> {
        validator
            .iter_errors(doc)
            .map(|error| {
                let message = error.to_string();
                Violation {
                    class: classify_violation(&message),
                    path: error.instance_path.to_string(),
                    message,
                }
            })
            .collect()
    };

    let violations = collect_violations(&document);

    if violations.is_empty() {
        return Ok(ContractOutcome::Passed {
            warnings,
            applied_fixes,
        });
    }

    // The document parsed but failed the schema; it may be an envelope
    // around the real payload. Unwrap at progressive and above.
    if contract.allow_recovery && contract.recovery_level != wave_manifest::RecoveryLevel::Conservative
    {
        if let Some((inner, label)) = crate::recovery::unwrap_envelope_value(&document) {
            if collect_violations(&inner).is_empty() {
                applied_fixes.push(label);
                return Ok(ContractOutcome::Passed {
                    warnings,
                    applied_fixes,
                });
            }
        }
    }

    // Recovery made the document parse but the schema still fails; under
    // progressive validation that is a warning, not an error.
    if contract.progressive_validation && !applied_fixes.is_empty() {
        for violation in &violations {
            warnings.push(format!(
                "post-recovery schema violation at {}: {}",
                violation.path, violation.message
            ));
        }
        return Ok(ContractOutcome::Passed {
            warnings,
            applied_fixes,
        });
    }

    let repair_prompt = build_repair_prompt(&violations, &applied_fixes, Some(&schema));
    Ok(ContractOutcome::Failed(ContractFailure {
        kind: FailureKind::Schema,
        violations,
        retryable: true,
        repair_prompt,
    }))
}

fn parse_failure(parse_error: &str, applied_fixes: &[String]) -> ContractOutcome {
    let violations = vec![Violation {
        class: crate::ViolationClass::Other,
        path: String::new(),
        message: format!("output is not valid JSON: {parse_error}"),
    }];
    let repair_prompt = build_repair_prompt(&violations, applied_fixes, None);
    ContractOutcome::Failed(ContractFailure {
        kind: FailureKind::Schema,
        violations,
        retryable: true,
        repair_prompt,
    })
}

/// Load the schema: inline wins over on-disk.
fn load_schema(req: &ValidationRequest<'_>) -> Result<Value, ContractError> {
    if let Some(inline) = &req.contract.schema {
        return Ok(inline.clone());
    }
    let path = req
        .contract
        .schema_path
        .as_ref()
        .ok_or_else(|| ContractError::Misconfigured("no schema or schema_path".to_string()))?;
    let resolved = if path.is_absolute() {
        path.clone()
    } else {
        req.workspace.join(path)
    };
    let text = std::fs::read_to_string(&resolved).map_err(|source| ContractError::Io {
        path: resolved.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| ContractError::SchemaInvalid(e.to_string()))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
