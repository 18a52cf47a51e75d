// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema-failure classification and repair-prompt construction.
//!
//! Validation errors are classified from their messages into a small set
//! of classes; each class knows how to phrase the minimal change required.
//! The resulting repair prompt becomes part of the step's input on retry.

use crate::Violation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classified cause of a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationClass {
    MissingRequired,
    TypeMismatch,
    EnumViolation,
    AdditionalProperties,
    ArrayIssue,
    StringFormat,
    Other,
}

impl ViolationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationClass::MissingRequired => "missing_required",
            ViolationClass::TypeMismatch => "type_mismatch",
            ViolationClass::EnumViolation => "enum_violation",
            ViolationClass::AdditionalProperties => "additional_properties",
            ViolationClass::ArrayIssue => "array_issue",
            ViolationClass::StringFormat => "string_format",
            ViolationClass::Other => "other",
        }
    }
}

/// Classify a schema-validator message.
pub fn classify_violation(message: &str) -> ViolationClass {
    let lower = message.to_ascii_lowercase();
    if lower.contains("required") && (lower.contains("missing") || lower.contains("property")) {
        ViolationClass::MissingRequired
    } else if lower.contains("is not one of") || lower.contains("enum") {
        ViolationClass::EnumViolation
    } else if lower.contains("is not of type") || lower.contains("invalid type") {
        ViolationClass::TypeMismatch
    } else if lower.contains("additional propert") {
        ViolationClass::AdditionalProperties
    } else if lower.contains("items") || lower.contains("minitems") || lower.contains("maxitems")
        || lower.contains("unique")
    {
        ViolationClass::ArrayIssue
    } else if lower.contains("format") || lower.contains("pattern") || lower.contains("minlength")
        || lower.contains("maxlength")
    {
        ViolationClass::StringFormat
    } else {
        ViolationClass::Other
    }
}

/// Phrase the minimal change required for one violation.
fn suggested_fix(violation: &Violation) -> String {
    let at = if violation.path.is_empty() {
        "the document root".to_string()
    } else {
        format!("`{}`", violation.path)
    };
    match violation.class {
        ViolationClass::MissingRequired => {
            format!("add the missing field at {at}")
        }
        ViolationClass::TypeMismatch => {
            format!("change the value type at {at} to match the schema")
        }
        ViolationClass::EnumViolation => {
            format!("use one of the allowed values at {at} (exact spelling and case)")
        }
        ViolationClass::AdditionalProperties => {
            format!("remove the undeclared field at {at}")
        }
        ViolationClass::ArrayIssue => {
            format!("fix the array at {at} (length, uniqueness, or item shape)")
        }
        ViolationClass::StringFormat => {
            format!("reformat the string at {at} to match the declared pattern")
        }
        ViolationClass::Other => format!("correct the value at {at}"),
    }
}

/// Build a worked example document from a schema, good enough to show the
/// expected shape: required fields with placeholder values, first enum
/// member where one is declared.
pub fn example_from_schema(schema: &Value) -> Option<Value> {
    build_example(schema, 0)
}

fn build_example(schema: &Value, depth: usize) -> Option<Value> {
    if depth > 4 {
        return None;
    }
    let obj = schema.as_object()?;

    if let Some(values) = obj.get("enum").and_then(|e| e.as_array()) {
        return values.first().cloned();
    }

    match obj.get("type").and_then(|t| t.as_str()) {
        Some("object") => {
            let mut example = serde_json::Map::new();
            let properties = obj.get("properties").and_then(|p| p.as_object());
            let required: Vec<&str> = obj
                .get("required")
                .and_then(|r| r.as_array())
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            if let Some(properties) = properties {
                for (name, prop) in properties {
                    if !required.is_empty() && !required.contains(&name.as_str()) {
                        continue;
                    }
                    if let Some(value) = build_example(prop, depth + 1) {
                        example.insert(name.clone(), value);
                    }
                }
            }
            Some(Value::Object(example))
        }
        Some("array") => {
            let item = obj
                .get("items")
                .and_then(|i| build_example(i, depth + 1))
                .unwrap_or(Value::String("...".to_string()));
            Some(Value::Array(vec![item]))
        }
        Some("string") => Some(Value::String("example".to_string())),
        Some("integer") | Some("number") => Some(Value::from(1)),
        Some("boolean") => Some(Value::Bool(true)),
        Some("null") => Some(Value::Null),
        _ => None,
    }
}

/// Construct the repair prompt for a failed contract.
///
/// Lists exactly which fields failed, the minimal change for each, the
/// fixes recovery already applied, and a worked example of the expected
/// shape when a schema is available.
pub fn build_repair_prompt(
    violations: &[Violation],
    applied_fixes: &[String],
    schema: Option<&Value>,
) -> String {
    let mut prompt = String::from(
        "The previous output failed its hand-over contract. \
         Produce the declared output again with these corrections:\n",
    );

    for violation in violations {
        prompt.push_str(&format!(
            "- [{}] {} — {}\n",
            violation.class.as_str(),
            violation.message,
            suggested_fix(violation)
        ));
    }

    if !applied_fixes.is_empty() {
        prompt.push_str(
            "\nThe output also needed repair before it could be parsed as JSON \
             (emit clean JSON this time):\n",
        );
        for fix in applied_fixes {
            prompt.push_str(&format!("- {fix}\n"));
        }
    }

    if let Some(schema) = schema {
        if let Some(example) = example_from_schema(schema) {
            if let Ok(pretty) = serde_json::to_string_pretty(&example) {
                prompt.push_str("\nExpected shape, for example:\n");
                prompt.push_str(&pretty);
                prompt.push('\n');
            }
        }
    }

    prompt
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
