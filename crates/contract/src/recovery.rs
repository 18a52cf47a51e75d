// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON recovery staircase.
//!
//! LLM output that claims to be JSON often nearly is. Each pass here is a
//! pure string-to-string function that records what it changed; the
//! staircase escalates conservative -> progressive -> aggressive under
//! configuration. Recovered text that parses is returned together with
//! the applied-fix list, which later feeds the repair prompt.

use serde_json::Value;
use wave_manifest::RecoveryLevel;

/// Result of a recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    /// Parsed document, when some pass (or the raw text) parsed.
    pub value: Option<Value>,
    /// Text after the last applied pass.
    pub text: String,
    /// Human-readable list of applied fixes, in order.
    pub fixes: Vec<String>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

/// Attempt to parse `input` as JSON, applying recovery passes up to
/// `level`. Wrapper detection runs last unless disabled.
pub fn recover_json(input: &str, level: RecoveryLevel, wrapper_detection: bool) -> RecoveryOutcome {
    let mut fixes = Vec::new();
    let mut warnings = Vec::new();

    // A top-level string whose content is itself JSON is a doubly-escaped
    // document; at progressive and above the staircase keeps going so the
    // unescape pass can unwrap it instead of returning the string.
    let parses_clean = |text: &str| -> Option<Value> {
        let value = serde_json::from_str::<Value>(text).ok()?;
        let quoted_doc = level != RecoveryLevel::Conservative
            && matches!(&value, Value::String(s) if serde_json::from_str::<Value>(s).is_ok());
        if quoted_doc {
            None
        } else {
            Some(value)
        }
    };

    if let Some(value) = parses_clean(input) {
        return RecoveryOutcome {
            value: Some(value),
            text: input.to_string(),
            fixes,
            warnings,
        };
    }

    // Conservative passes
    let mut text = input.to_string();
    text = apply(strip_bom, &mut fixes, text, "stripped UTF-8 BOM");
    text = apply(strip_comments, &mut fixes, text, "removed // and /* */ comments");
    text = apply(
        remove_trailing_commas,
        &mut fixes,
        text,
        "removed trailing commas",
    );

    if let Some(value) = parses_clean(&text) {
        return RecoveryOutcome {
            value: Some(value),
            text,
            fixes,
            warnings,
        };
    }

    if level != RecoveryLevel::Conservative {
        // Progressive passes
        text = apply(
            unescape_double_escaped,
            &mut fixes,
            text,
            "unescaped doubly-escaped strings",
        );
        if let Some((inner, label)) = unwrap_envelope(&text) {
            fixes.push(label);
            text = inner;
        }

        if let Some(value) = parses_clean(&text) {
            return RecoveryOutcome {
                value: Some(value),
                text,
                fixes,
                warnings,
            };
        }
    }

    if level == RecoveryLevel::Aggressive {
        text = apply(
            close_unterminated_string,
            &mut fixes,
            text,
            "closed unterminated string",
        );
        text = apply(
            balance_brackets,
            &mut fixes,
            text,
            "reconstructed missing closing brackets",
        );

        if let Some(value) = parses_clean(&text) {
            warnings.push("aggressive reconstruction applied; verify content".to_string());
            return RecoveryOutcome {
                value: Some(value),
                text,
                fixes,
                warnings,
            };
        }
    }

    if wrapper_detection {
        if let Some(candidate) = extract_json_substring(input) {
            if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                fixes.push("extracted JSON substring from wrapper text".to_string());
                return RecoveryOutcome {
                    value: Some(value),
                    text: candidate,
                    fixes,
                    warnings,
                };
            }
        }
    }

    warnings.push("recovery exhausted without a parseable document".to_string());
    RecoveryOutcome {
        value: None,
        text,
        fixes,
        warnings,
    }
}

/// Run one pass, recording the fix label only when the text changed.
fn apply(
    pass: fn(&str) -> String,
    fixes: &mut Vec<String>,
    text: String,
    label: &str,
) -> String {
    let out = pass(&text);
    if out != text {
        fixes.push(label.to_string());
    }
    out
}

/// Strip a UTF-8 byte-order mark.
pub fn strip_bom(input: &str) -> String {
    input.strip_prefix('\u{feff}').unwrap_or(input).to_string()
}

/// Remove `// line` and `/* block */` comments outside string literals.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
        } else if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
        } else if c == '/' && i + 1 < bytes.len() && bytes[i + 1] == '/' {
            while i < bytes.len() && bytes[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && i + 1 < bytes.len() && bytes[i + 1] == '*' {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == '*' && bytes[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

/// Remove trailing commas in arrays and objects, outside strings.
pub fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            // Look ahead past whitespace for a closing bracket.
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1; // drop the comma, keep the whitespace
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Unwrap common envelopes: `{"error": ..., "data": {...}}` -> inner data.
///
/// Returns the unwrapped text and a fix label, or None when no envelope
/// shape is recognized.
pub fn unwrap_envelope(input: &str) -> Option<(String, String)> {
    let value: Value = serde_json::from_str(input).ok()?;
    let (inner, label) = unwrap_envelope_value(&value)?;
    let text = serde_json::to_string(&inner).ok()?;
    Some((text, label))
}

/// Value-level envelope unwrap, shared with the schema validator (which
/// holds an already-parsed document).
pub fn unwrap_envelope_value(value: &Value) -> Option<(Value, String)> {
    let obj = value.as_object()?;

    for key in ["data", "result", "response", "output"] {
        if let Some(inner) = obj.get(key) {
            if inner.is_object() || inner.is_array() {
                // Only unwrap when the remaining keys look like envelope
                // metadata, not payload.
                let rest_is_meta = obj.keys().filter(|k| k.as_str() != key).all(|k| {
                    matches!(
                        k.as_str(),
                        "error" | "status" | "ok" | "success" | "code" | "message"
                    )
                });
                if rest_is_meta && obj.len() > 1 {
                    return Some((inner.clone(), format!("unwrapped {key:?} envelope")));
                }
            }
        }
    }
    None
}

/// Unescape doubly-escaped string content (`{\"a\": 1}` as a whole doc).
pub fn unescape_double_escaped(input: &str) -> String {
    let trimmed = input.trim();

    // Whole document wrapped in quotes: try parsing as a JSON string first.
    if trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(trimmed) {
            if serde_json::from_str::<Value>(&inner).is_ok() {
                return inner;
            }
        }
    }

    // Bare but escaped: {\"a\": 1}
    if trimmed.contains("\\\"") && serde_json::from_str::<Value>(trimmed).is_err() {
        let unescaped = trimmed.replace("\\\"", "\"");
        if serde_json::from_str::<Value>(&unescaped).is_ok() {
            return unescaped;
        }
    }

    input.to_string()
}

/// Close an unterminated string literal at end of input.
pub fn close_unterminated_string(input: &str) -> String {
    let mut in_string = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            if c == '\\' {
                chars.next();
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        }
    }
    if in_string {
        let mut out = input.to_string();
        out.push('"');
        out
    } else {
        input.to_string()
    }
}

/// Append missing closing braces/brackets in nesting order.
pub fn balance_brackets(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\\' {
                chars.next();
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        return input.to_string();
    }
    let mut out = input.trim_end().to_string();
    // A dangling comma before the close would re-break the document.
    while out.ends_with(',') {
        out.pop();
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

/// Find a balanced JSON object or array embedded in surrounding text.
pub fn extract_json_substring(input: &str) -> Option<String> {
    let start = input.find(['{', '['])?;
    let open = input[start..].chars().next()?;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;
    for (offset, c) in input[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(input[start..start + offset + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
