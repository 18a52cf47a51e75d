// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{ValidationRequest, ViolationClass};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use wave_manifest::{ContractDef, ContractType, RecoveryLevel};

fn contract(schema: serde_json::Value) -> ContractDef {
    ContractDef {
        contract_type: ContractType::StructuralSchema,
        schema_path: None,
        schema: Some(schema),
        command: None,
        source: None,
        sections: Vec::new(),
        must_pass: true,
        max_retries: 2,
        on_failure: None,
        allow_recovery: true,
        recovery_level: RecoveryLevel::Conservative,
        progressive_validation: false,
        disable_wrapper_detection: false,
    }
}

fn severity_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["severity"],
        "properties": {
            "severity": {"type": "string", "enum": ["low", "med", "high"]}
        }
    })
}

fn write_subject(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("out.json");
    std::fs::write(&path, content).unwrap();
    PathBuf::from("out.json")
}

fn request<'a>(
    contract: &'a ContractDef,
    workspace: &'a TempDir,
    subject: PathBuf,
) -> ValidationRequest<'a> {
    ValidationRequest {
        contract,
        gates: &[],
        workspace: workspace.path(),
        subject: Some(subject),
    }
}

#[test]
fn conforming_document_passes() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(&dir, r#"{"severity": "low"}"#);
    let c = contract(severity_schema());

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    assert!(outcome.is_passed());
}

#[test]
fn enum_violation_is_classified_with_repair_prompt() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(&dir, r#"{"severity": "HIGH"}"#);
    let c = contract(severity_schema());

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    match outcome {
        ContractOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Schema);
            assert!(failure.retryable);
            assert_eq!(failure.violations[0].class, ViolationClass::EnumViolation);
            assert!(failure.repair_prompt.contains("severity"));
            assert!(failure.repair_prompt.contains("low"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn missing_subject_file_fails_with_guidance() {
    let dir = TempDir::new().unwrap();
    let c = contract(severity_schema());

    let outcome = validate_schema(&request(&c, &dir, PathBuf::from("never.json"))).unwrap();
    match outcome {
        ContractOutcome::Failed(failure) => {
            assert!(failure.repair_prompt.contains("was not produced"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn malformed_json_recovers_and_validates() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(&dir, "{\"severity\": \"low\", // fine\n}");
    let c = contract(severity_schema());

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    match outcome {
        ContractOutcome::Passed { applied_fixes, .. } => {
            assert!(!applied_fixes.is_empty());
        }
        other => panic!("expected pass via recovery, got {other:?}"),
    }
}

#[test]
fn recovery_disabled_fails_on_malformed_json() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(&dir, "{\"severity\": \"low\",}");
    let mut c = contract(severity_schema());
    c.allow_recovery = false;

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    match outcome {
        ContractOutcome::Failed(failure) => {
            assert!(failure.violations[0].message.contains("not valid JSON"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn progressive_validation_downgrades_post_recovery_failure() {
    let dir = TempDir::new().unwrap();
    // Recovers (trailing comma) but then fails the schema (bad enum value)
    let subject = write_subject(&dir, "{\"severity\": \"HIGH\",}");
    let mut c = contract(severity_schema());
    c.progressive_validation = true;

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    match outcome {
        ContractOutcome::Passed { warnings, .. } => {
            assert!(warnings.iter().any(|w| w.contains("post-recovery")));
        }
        other => panic!("expected downgraded pass, got {other:?}"),
    }
}

#[test]
fn envelope_is_unwrapped_at_progressive_level() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(
        &dir,
        r#"{"error": null, "data": {"severity": "low"}}"#,
    );
    let mut c = contract(severity_schema());
    c.recovery_level = RecoveryLevel::Progressive;

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    match outcome {
        ContractOutcome::Passed { applied_fixes, .. } => {
            assert!(applied_fixes.iter().any(|f| f.contains("envelope")));
        }
        other => panic!("expected pass via envelope unwrap, got {other:?}"),
    }
}

#[test]
fn schema_from_disk_is_loaded() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("schema.json"),
        severity_schema().to_string(),
    )
    .unwrap();
    let subject = write_subject(&dir, r#"{"severity": "med"}"#);

    let mut c = contract(json!({}));
    c.schema = None;
    c.schema_path = Some(PathBuf::from("schema.json"));

    let outcome = validate_schema(&request(&c, &dir, subject)).unwrap();
    assert!(outcome.is_passed());
}

#[test]
fn invalid_schema_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let subject = write_subject(&dir, r#"{}"#);
    let c = contract(json!({"type": "not-a-type"}));

    let err = validate_schema(&request(&c, &dir, subject)).unwrap_err();
    assert!(matches!(err, ContractError::SchemaInvalid(_)));
}
