// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality gates: orthogonal checks composed on top of the primary
//! contract.
//!
//! Gate parameters are free-form JSON; each gate reads the keys it knows.
//! Unknown gate types fail loudly rather than silently passing.

use crate::command::{run_with_timeout, CONTRACT_COMMAND_TIMEOUT};
use crate::{ContractError, ValidationRequest};
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;

/// Outcome of one gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    pub gate: String,
    pub passed: bool,
    pub required: bool,
    pub detail: String,
}

/// Evaluate every declared gate against the subject document/workspace.
pub async fn evaluate_gates(
    req: &ValidationRequest<'_>,
) -> Result<Vec<GateResult>, ContractError> {
    let subject = req.subject_path();
    let document = load_subject_json(subject.as_deref());

    let mut results = Vec::with_capacity(req.gates.len());
    for gate in req.gates {
        let outcome = match gate.gate_type.as_str() {
            "required-fields" => required_fields(document.as_ref(), &gate.parameters),
            "content-completeness" => {
                content_completeness(subject.as_deref(), &gate.parameters, gate.threshold)
            }
            "link-validation" => link_validation(document.as_ref()),
            "file-existence" => file_existence(req.workspace, &gate.parameters),
            "cross-reference" => cross_reference(document.as_ref(), &gate.parameters),
            "code-compilation" | "test-execution" => {
                command_gate(req.workspace, &gate.parameters).await
            }
            other => {
                return Err(ContractError::Misconfigured(format!(
                    "unknown quality gate type {other:?}"
                )))
            }
        };
        let (passed, detail) = outcome;
        results.push(GateResult {
            gate: gate.gate_type.clone(),
            passed,
            required: gate.required,
            detail,
        });
    }
    Ok(results)
}

fn load_subject_json(subject: Option<&Path>) -> Option<Value> {
    let path = subject?;
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Look up a dotted path (`report.items.0.id`) in a JSON document.
fn lookup<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = document;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// `required-fields`: every dotted path in `fields` must exist and be
/// non-null.
fn required_fields(document: Option<&Value>, params: &Value) -> (bool, String) {
    let Some(document) = document else {
        return (false, "subject is not a JSON document".to_string());
    };
    let fields: Vec<&str> = params
        .get("fields")
        .and_then(|f| f.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !matches!(lookup(document, f), Some(v) if !v.is_null()))
        .collect();

    if missing.is_empty() {
        (true, format!("{} fields present", fields.len()))
    } else {
        (false, format!("missing fields: {}", missing.join(", ")))
    }
}

/// `content-completeness`: minimum word/char counts and keyword coverage.
fn content_completeness(
    subject: Option<&Path>,
    params: &Value,
    threshold: Option<f64>,
) -> (bool, String) {
    let Some(path) = subject else {
        return (false, "no subject document".to_string());
    };
    let Ok(text) = std::fs::read_to_string(path) else {
        return (false, format!("cannot read {}", path.display()));
    };

    let min_words = params.get("min_words").and_then(|v| v.as_u64()).unwrap_or(0);
    let min_chars = params.get("min_chars").and_then(|v| v.as_u64()).unwrap_or(0);
    let keywords: Vec<&str> = params
        .get("keywords")
        .and_then(|k| k.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let words = text.split_whitespace().count() as u64;
    if words < min_words {
        return (false, format!("{words} words, {min_words} required"));
    }
    if (text.len() as u64) < min_chars {
        return (false, format!("{} chars, {min_chars} required", text.len()));
    }

    if !keywords.is_empty() {
        let lower = text.to_ascii_lowercase();
        let hit = keywords
            .iter()
            .filter(|k| lower.contains(&k.to_ascii_lowercase()))
            .count();
        let coverage = hit as f64 / keywords.len() as f64;
        let required = threshold.unwrap_or(1.0);
        if coverage < required {
            return (
                false,
                format!("keyword coverage {coverage:.2} below {required:.2}"),
            );
        }
    }

    (true, format!("{words} words"))
}

/// `link-validation`: every string field that looks like a URL must carry
/// an http(s) scheme.
fn link_validation(document: Option<&Value>) -> (bool, String) {
    let Some(document) = document else {
        return (false, "subject is not a JSON document".to_string());
    };

    let mut bad = Vec::new();
    collect_bad_links(document, "", &mut bad);

    if bad.is_empty() {
        (true, "all links carry a scheme".to_string())
    } else {
        (false, format!("schemeless links at: {}", bad.join(", ")))
    }
}

fn collect_bad_links(value: &Value, path: &str, bad: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let is_link_field = key.ends_with("url") || key.ends_with("link");
                if is_link_field {
                    if let Some(s) = v.as_str() {
                        if !s.starts_with("http://") && !s.starts_with("https://") {
                            bad.push(child.clone());
                        }
                    }
                }
                collect_bad_links(v, &child, bad);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                collect_bad_links(v, &format!("{path}.{i}"), bad);
            }
        }
        _ => {}
    }
}

/// `file-existence`: every path in `paths` exists under the workspace.
fn file_existence(workspace: &Path, params: &Value) -> (bool, String) {
    let paths: Vec<&str> = params
        .get("paths")
        .and_then(|p| p.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let missing: Vec<&str> = paths
        .iter()
        .copied()
        .filter(|p| !workspace.join(p).exists())
        .collect();

    if missing.is_empty() {
        (true, format!("{} files present", paths.len()))
    } else {
        (false, format!("missing files: {}", missing.join(", ")))
    }
}

/// `cross-reference`: the field at `field` must mention every expected
/// back-link.
fn cross_reference(document: Option<&Value>, params: &Value) -> (bool, String) {
    let Some(document) = document else {
        return (false, "subject is not a JSON document".to_string());
    };
    let field = params.get("field").and_then(|f| f.as_str()).unwrap_or("related");
    let expected: Vec<&str> = params
        .get("expected")
        .and_then(|e| e.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let haystack = match lookup(document, field) {
        Some(value) => value.to_string(),
        None => return (false, format!("field {field:?} not found")),
    };

    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|e| !haystack.contains(e))
        .collect();

    if missing.is_empty() {
        (true, format!("{} references found", expected.len()))
    } else {
        (false, format!("missing references: {}", missing.join(", ")))
    }
}

/// `code-compilation` / `test-execution`: a parameterized command exits
/// zero in the workspace.
async fn command_gate(workspace: &Path, params: &Value) -> (bool, String) {
    let Some(command_line) = params.get("command").and_then(|c| c.as_str()) else {
        return (false, "gate has no command parameter".to_string());
    };

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(format!("set -euo pipefail\n{command_line}"))
        .current_dir(workspace);

    match run_with_timeout(cmd, CONTRACT_COMMAND_TIMEOUT, "quality-gate command").await {
        Ok(output) if output.status.success() => (true, "command exited zero".to_string()),
        Ok(output) => (
            false,
            format!(
                "command exited {}",
                output.status.code().unwrap_or(-1)
            ),
        ),
        Err(message) => (false, message),
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
