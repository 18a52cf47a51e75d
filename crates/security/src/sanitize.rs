// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt-input sanitization.
//!
//! Detects role-override and instruction-override phrases in untrusted
//! input before it reaches an agent prompt. Two modes: strict rejects the
//! input outright; sanitize removes the matched spans and reports what was
//! done together with a risk score in [0, 100].

use crate::scrub::credential_keyword_count;
use crate::SecurityError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Content cap applied after sanitization (1 MiB).
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)ignore\s+(?:all\s+)?previous\s+instructions",
        r"(?i)disregard\s+(?:all\s+)?(?:prior|previous|earlier)\s+(?:instructions|context|rules)",
        r"(?i)forget\s+(?:everything|all)\s+(?:above|before)",
        r"(?i)you\s+are\s+now\s+(?:a|an|the)?",
        r"(?i)act\s+as\s+(?:if\s+you\s+are|a|an)\s+",
        r"(?i)pretend\s+(?:to\s+be|you\s+are)",
        r"(?i)new\s+(?:system\s+)?instructions\s*:",
        r"(?i)\bsystem\s*prompt\s*override\b",
        r"(?i)<\s*/?\s*system\s*>",
        r"(?i)\[/?INST\]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("constant regex pattern is valid"))
    .collect()
});

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static SUSPICIOUS_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*(?:script|iframe|object)\b.*?(?:<\s*/\s*(?:script|iframe|object)\s*>|\z)")
        .expect("constant regex pattern is valid")
});

/// How to treat detected injection patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeMode {
    /// Reject input containing any injection pattern.
    Strict,
    /// Remove matched spans and continue.
    #[default]
    Sanitize,
}

/// Outcome of a sanitization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizeReport {
    pub sanitized: String,
    /// Injection patterns removed.
    pub injection_hits: usize,
    /// Suspicious markup blocks removed.
    pub markup_removed: usize,
    /// Whether the content cap truncated the input.
    pub truncated: bool,
    /// Credential-keyword occurrences observed (not removed here).
    pub credential_keywords: usize,
    /// Combined risk estimate in [0, 100].
    pub risk_score: u8,
}

/// Sanitize untrusted input destined for a prompt.
///
/// In strict mode, any injection hit is an error. In sanitize mode the
/// matched spans are removed, whitespace is collapsed, and the result is
/// truncated at [`MAX_CONTENT_BYTES`].
pub fn sanitize_input(input: &str, mode: SanitizeMode) -> Result<SanitizeReport, SecurityError> {
    let mut injection_hits = 0usize;
    let mut text = input.to_string();

    for pattern in INJECTION_PATTERNS.iter() {
        if mode == SanitizeMode::Strict {
            if let Some(m) = pattern.find(&text) {
                return Err(SecurityError::InjectionDetected(m.as_str().to_string()));
            }
        } else {
            let count = pattern.find_iter(&text).count();
            if count > 0 {
                injection_hits += count;
                text = pattern.replace_all(&text, " ").into_owned();
            }
        }
    }

    let markup_removed = SUSPICIOUS_MARKUP.find_iter(&text).count();
    if markup_removed > 0 {
        text = SUSPICIOUS_MARKUP.replace_all(&text, " ").into_owned();
    }

    if injection_hits > 0 || markup_removed > 0 {
        text = collapse_whitespace(&text);
    }

    let truncated = text.len() > MAX_CONTENT_BYTES;
    if truncated {
        text = truncate_at_char_boundary(text, MAX_CONTENT_BYTES);
    }

    let credential_keywords = credential_keyword_count(&text);
    let risk_score = risk_score(injection_hits, markup_removed, truncated, credential_keywords);

    if injection_hits > 0 {
        tracing::warn!(
            injection_hits,
            markup_removed,
            risk_score,
            "removed prompt-injection patterns from input"
        );
    }

    Ok(SanitizeReport {
        sanitized: text,
        injection_hits,
        markup_removed,
        truncated,
        credential_keywords,
        risk_score,
    })
}

/// Combine signals into a bounded score: injections dominate, everything
/// else nudges.
fn risk_score(injections: usize, markup: usize, truncated: bool, credentials: usize) -> u8 {
    let mut score = injections.saturating_mul(25) + markup.saturating_mul(10);
    if truncated {
        score += 10;
    }
    score += credentials.saturating_mul(5).min(20);
    score.min(100) as u8
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        if c == '\n' {
            out.push(c);
            last_was_space = false;
        } else if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn truncate_at_char_boundary(mut s: String, max: usize) -> String {
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
