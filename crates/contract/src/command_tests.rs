// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{ContractOutcome, ValidationRequest};
use std::time::Duration;
use tempfile::TempDir;
use wave_manifest::{ContractDef, ContractType, RecoveryLevel};

fn test_suite_contract(command: &str) -> ContractDef {
    ContractDef {
        contract_type: ContractType::TestSuite,
        schema_path: None,
        schema: None,
        command: Some(command.to_string()),
        source: None,
        sections: Vec::new(),
        must_pass: true,
        max_retries: 1,
        on_failure: None,
        allow_recovery: false,
        recovery_level: RecoveryLevel::Conservative,
        progressive_validation: false,
        disable_wrapper_detection: false,
    }
}

fn request<'a>(contract: &'a ContractDef, workspace: &'a TempDir) -> ValidationRequest<'a> {
    ValidationRequest {
        contract,
        gates: &[],
        workspace: workspace.path(),
        subject: None,
    }
}

#[tokio::test]
async fn zero_exit_passes() {
    let dir = TempDir::new().unwrap();
    let c = test_suite_contract("true");
    let outcome = validate_test_suite(&request(&c, &dir)).await.unwrap();
    assert!(outcome.is_passed());
}

#[tokio::test]
async fn nonzero_exit_fails_with_stderr_tail() {
    let dir = TempDir::new().unwrap();
    let c = test_suite_contract("echo boom >&2; exit 3");
    let outcome = validate_test_suite(&request(&c, &dir)).await.unwrap();
    match outcome {
        ContractOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Test);
            assert!(failure.retryable);
            assert!(failure.violations[0].message.contains("boom"));
            assert!(failure.violations[0].message.contains('3'));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn command_runs_in_the_workspace() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("expected.txt"), "present").unwrap();
    let c = test_suite_contract("test -f expected.txt");
    let outcome = validate_test_suite(&request(&c, &dir)).await.unwrap();
    assert!(outcome.is_passed());
}

#[tokio::test]
async fn missing_command_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let mut c = test_suite_contract("x");
    c.command = None;
    let err = validate_test_suite(&request(&c, &dir)).await.unwrap_err();
    assert!(matches!(err, ContractError::Misconfigured(_)));
}

#[tokio::test]
async fn typed_source_python_compiles() {
    // python3 is the one toolchain reliably present in CI images
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gen.py"), "x = 1\n").unwrap();

    let mut c = test_suite_contract("unused");
    c.contract_type = ContractType::TypedSource;
    c.command = None;
    c.source = Some("gen.py".into());

    let outcome = validate_typed_source(&request(&c, &dir)).await.unwrap();
    assert!(outcome.is_passed(), "{outcome:?}");
}

#[tokio::test]
async fn typed_source_rejects_broken_python() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gen.py"), "def broken(:\n").unwrap();

    let mut c = test_suite_contract("unused");
    c.contract_type = ContractType::TypedSource;
    c.command = None;
    c.source = Some("gen.py".into());

    let outcome = validate_typed_source(&request(&c, &dir)).await.unwrap();
    match outcome {
        ContractOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Compile),
        other => panic!("expected compile failure, got {other:?}"),
    }
}

#[tokio::test]
async fn typed_source_unknown_extension_is_config_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gen.cob"), "").unwrap();

    let mut c = test_suite_contract("unused");
    c.contract_type = ContractType::TypedSource;
    c.command = None;
    c.source = Some("gen.cob".into());

    let err = validate_typed_source(&request(&c, &dir)).await.unwrap_err();
    assert!(matches!(err, ContractError::Misconfigured(_)));
}

#[tokio::test]
async fn typed_source_missing_file_is_subject_missing() {
    let dir = TempDir::new().unwrap();
    let mut c = test_suite_contract("unused");
    c.contract_type = ContractType::TypedSource;
    c.command = None;
    c.source = Some("ghost.rs".into());

    let err = validate_typed_source(&request(&c, &dir)).await.unwrap_err();
    assert!(matches!(err, ContractError::SubjectMissing(_)));
}

#[tokio::test]
async fn run_with_timeout_reports_expiry() {
    let mut cmd = tokio::process::Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(100), "sleepy test")
        .await
        .unwrap_err();
    assert!(err.contains("timed out"));
}

#[test]
fn compile_command_selects_strict_toolchains() {
    let (prog, args) = compile_command(std::path::Path::new("gen.rs")).unwrap();
    assert_eq!(prog, "rustc");
    assert!(args.contains(&"--emit=metadata".to_string()));

    let (prog, args) = compile_command(std::path::Path::new("gen.ts")).unwrap();
    assert_eq!(prog, "tsc");
    assert!(args.contains(&"--strict".to_string()));

    assert!(compile_command(std::path::Path::new("gen.unknown")).is_none());
}
