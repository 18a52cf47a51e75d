// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential scrubbing.
//!
//! Every log, event, and trace line passes through `scrub_credentials`
//! before persistence. The pattern matches a fixed set of keyword stems
//! followed by an assignment-ish separator and a value; the value portion
//! is replaced with a fixed marker.

use regex::Regex;
use std::sync::LazyLock;

/// Replacement for matched credential values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static CREDENTIAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // (stem)(optional = or :)(value). Stems may appear as suffixes too
    // (GITHUB_TOKEN, DB_PASSWORD). The \b keeps "tokens"/"authorization"
    // prose from matching via an empty separator.
    Regex::new(
        r"(?i)((?:[A-Z0-9_]*_)?(?:API_KEY|ACCESS_KEY|PRIVATE_KEY|TOKEN|SECRET|PASSWORD|CREDENTIAL|AUTH))\b([=:]?\s*)([\w\-]+)",
    )
    .expect("constant regex pattern is valid")
});

/// Replace credential values with [`REDACTION_MARKER`].
///
/// `API_KEY=sk-live-1234` becomes `API_KEY=[REDACTED]`. Keys are kept so
/// operators can still see *what* was set.
pub fn scrub_credentials(input: &str) -> String {
    CREDENTIAL_PATTERN
        .replace_all(input, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], &caps[2], REDACTION_MARKER)
        })
        .into_owned()
}

/// Whether the input still contains an unredacted credential assignment.
pub fn contains_credentials(input: &str) -> bool {
    CREDENTIAL_PATTERN.is_match(input)
}

/// Count credential-keyword occurrences (feeds the sanitizer risk score).
pub fn credential_keyword_count(input: &str) -> usize {
    CREDENTIAL_PATTERN.captures_iter(input).count()
}

#[cfg(test)]
#[path = "scrub_tests.rs"]
mod tests;
