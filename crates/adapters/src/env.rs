// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment curation for adapter subprocesses.
//!
//! The subprocess never inherits the full host environment. The base
//! whitelist keeps the CLI functional (binary resolution, home-relative
//! config, locale); everything else must be named in the manifest's
//! `env_passthrough` list.

/// Base variables every adapter subprocess receives when present.
const BASE_WHITELIST: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TERM", "USER", "SHELL"];

/// Build the curated environment for one invocation.
///
/// - `passthrough`: extra variable names forwarded from the host env.
/// - `extra`: explicit key/value pairs (highest precedence).
pub fn curated_env(
    passthrough: &[String],
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = Vec::new();

    for key in BASE_WHITELIST {
        if let Ok(value) = std::env::var(key) {
            env.push((key.to_string(), value));
        }
    }

    for key in passthrough {
        if env.iter().any(|(k, _)| k == key) {
            continue;
        }
        if let Ok(value) = std::env::var(key) {
            env.push((key.clone(), value));
        } else {
            tracing::debug!(%key, "passthrough variable not set on host");
        }
    }

    for (key, value) in extra {
        if let Some(existing) = env.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.clone();
        } else {
            env.push((key.clone(), value.clone()));
        }
    }

    env
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
