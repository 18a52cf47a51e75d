// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template variable interpolation
//!
//! Prompt templates and mount sources use `{name}` placeholders, where
//! `name` is an identifier optionally namespaced with dots
//! (`{input}`, `{task}`, `{vars.branch_name}`). Unknown placeholders are
//! left as-is, which keeps literal JSON in prompts (schema excerpts,
//! worked examples) intact — quoted keys never match the identifier rule.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex pattern for {variable_name} or {namespace.variable_name}
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
pub static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// Interpolate `{name}` placeholders with values from the vars map.
///
/// Unknown template variables are left as-is.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(val) => val.clone(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Collect the distinct placeholder names referenced by a template.
pub fn referenced_vars(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in VAR_PATTERN.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
