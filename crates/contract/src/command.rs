// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-running contracts: test-suite and typed-source.

use crate::classify::build_repair_prompt;
use crate::{ContractError, ContractFailure, ContractOutcome, FailureKind, ValidationRequest, Violation};
use crate::ViolationClass;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for contract commands.
pub const CONTRACT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Validate a test-suite contract: the declared command must exit zero in
/// the step workspace.
pub async fn validate_test_suite(
    req: &ValidationRequest<'_>,
) -> Result<ContractOutcome, ContractError> {
    let command_line = req
        .contract
        .command
        .as_deref()
        .ok_or_else(|| ContractError::Misconfigured("test-suite contract has no command".to_string()))?;

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(format!("set -euo pipefail\n{command_line}"))
        .current_dir(req.workspace);

    tracing::debug!(command = command_line, cwd = %req.workspace.display(), "running test-suite contract");

    match run_with_timeout(cmd, CONTRACT_COMMAND_TIMEOUT, "test-suite command").await {
        Ok(output) if output.status.success() => Ok(ContractOutcome::passed()),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = tail_lines(&stderr, 20);
            let violations = vec![Violation {
                class: ViolationClass::Other,
                path: command_line.to_string(),
                message: format!(
                    "command exited {} — {}",
                    output.status.code().unwrap_or(-1),
                    tail
                ),
            }];
            let repair_prompt = format!(
                "The verification command `{command_line}` failed:\n{tail}\n\
                 Fix the output so the command exits zero."
            );
            Ok(ContractOutcome::Failed(ContractFailure {
                kind: FailureKind::Test,
                violations,
                retryable: true,
                repair_prompt,
            }))
        }
        Err(message) => Ok(ContractOutcome::Failed(ContractFailure {
            kind: FailureKind::Test,
            violations: vec![Violation {
                class: ViolationClass::Other,
                path: command_line.to_string(),
                message: message.clone(),
            }],
            retryable: true,
            repair_prompt: format!("The verification command could not complete: {message}"),
        })),
    }
}

/// Compile command for a typed source file, chosen by extension.
///
/// Each toolchain runs in its strict mode; none of them emit build
/// outputs into the workspace.
fn compile_command(source: &Path) -> Option<(String, Vec<String>)> {
    let ext = source.extension()?.to_str()?;
    let path = source.display().to_string();
    let (program, args): (&str, Vec<String>) = match ext {
        "rs" => (
            "rustc",
            vec![
                "--edition".to_string(),
                "2021".to_string(),
                "--emit=metadata".to_string(),
                "--deny".to_string(),
                "warnings".to_string(),
                "-o".to_string(),
                "/dev/null".to_string(),
                path,
            ],
        ),
        "ts" => (
            "tsc",
            vec!["--noEmit".to_string(), "--strict".to_string(), path],
        ),
        "py" => ("python3", vec!["-m".to_string(), "py_compile".to_string(), path]),
        "go" => ("gofmt", vec!["-e".to_string(), path]),
        _ => return None,
    };
    Some((program.to_string(), args))
}

/// Validate a typed-source contract: the generated source file must
/// compile under the strict setting of its toolchain.
pub async fn validate_typed_source(
    req: &ValidationRequest<'_>,
) -> Result<ContractOutcome, ContractError> {
    let source = req
        .subject_path()
        .ok_or_else(|| ContractError::Misconfigured("typed-source contract has no source".to_string()))?;
    if !source.exists() {
        return Err(ContractError::SubjectMissing(source));
    }

    let (program, args) = compile_command(&source).ok_or_else(|| {
        ContractError::Misconfigured(format!(
            "no toolchain known for {}",
            source.display()
        ))
    })?;

    let mut cmd = Command::new(&program);
    cmd.args(&args).current_dir(req.workspace);

    tracing::debug!(program, source = %source.display(), "running typed-source contract");

    match run_with_timeout(cmd, CONTRACT_COMMAND_TIMEOUT, "typed-source compile").await {
        Ok(output) if output.status.success() => Ok(ContractOutcome::passed()),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let violations = parse_compiler_errors(&stderr, &source);
            let repair_prompt = build_repair_prompt(&violations, &[], None);
            Ok(ContractOutcome::Failed(ContractFailure {
                kind: FailureKind::Compile,
                violations,
                retryable: true,
                repair_prompt,
            }))
        }
        Err(message) => Ok(ContractOutcome::Failed(ContractFailure {
            kind: FailureKind::Compile,
            violations: vec![Violation {
                class: ViolationClass::Other,
                path: source.display().to_string(),
                message,
            }],
            retryable: false,
            repair_prompt: String::new(),
        })),
    }
}

/// Pull individual `error:` lines out of compiler stderr.
fn parse_compiler_errors(stderr: &str, source: &Path) -> Vec<Violation> {
    let mut violations: Vec<Violation> = stderr
        .lines()
        .filter(|line| line.contains("error"))
        .take(10)
        .map(|line| Violation {
            class: ViolationClass::Other,
            path: source.display().to_string(),
            message: line.trim().to_string(),
        })
        .collect();

    if violations.is_empty() {
        violations.push(Violation {
            class: ViolationClass::Other,
            path: source.display().to_string(),
            message: tail_lines(stderr, 10),
        });
    }
    violations
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
