// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path validation.
//!
//! Rejects traversal markers before any filesystem access, then (for paths
//! that exist) refuses symlinks and confines the path to an allow-list of
//! approved roots.

use crate::SecurityError;
use std::path::{Path, PathBuf};

/// Maximum accepted path length in bytes.
const MAX_PATH_LEN: usize = 4096;

/// Substrings that indicate an attempted traversal, checked against the raw
/// input before normalization. URL-encoded forms cover `%2e` (.) and `%2f` (/)
/// in both cases.
const TRAVERSAL_MARKERS: &[&str] = &[
    "..",
    "%2e%2e",
    "%2E%2E",
    "%2e.",
    ".%2e",
    "..%2f",
    "%2f..",
    "..%5c",
    "%5c..",
];

/// Policy for validating untrusted path inputs.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    /// Roots a validated path must fall under. Empty = any root.
    pub allowed_roots: Vec<PathBuf>,
    /// Permit symlinks (off by default).
    pub allow_symlinks: bool,
}

impl PathPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.allowed_roots.push(root.into());
        self
    }

    pub fn allow_symlinks(mut self) -> Self {
        self.allow_symlinks = true;
        self
    }
}

/// Validate an untrusted path input against the policy.
///
/// Returns the path joined onto `base` (absolute inputs are taken as-is).
/// Checks, in order: length cap, traversal markers, mixed separators,
/// allow-listed roots, symlink refusal. The symlink check only applies when
/// the path already exists; creation races are the caller's concern.
pub fn validate_path(
    input: &str,
    base: &Path,
    policy: &PathPolicy,
) -> Result<PathBuf, SecurityError> {
    if input.is_empty() {
        return Err(SecurityError::PathRejected("empty path".to_string()));
    }
    if input.len() > MAX_PATH_LEN {
        return Err(SecurityError::PathRejected(format!(
            "path exceeds {} bytes",
            MAX_PATH_LEN
        )));
    }
    if input.contains('\0') {
        return Err(SecurityError::PathRejected(
            "path contains NUL byte".to_string(),
        ));
    }

    let lowered = input.to_ascii_lowercase();
    for marker in TRAVERSAL_MARKERS {
        if lowered.contains(marker) {
            return Err(SecurityError::PathRejected(format!(
                "traversal marker {:?} in {:?}",
                marker, input
            )));
        }
    }

    // Windows-style separators in a unix path are always an attempt to
    // smuggle structure past naive checks.
    if input.contains('\\') {
        return Err(SecurityError::PathRejected(format!(
            "mixed separators in {:?}",
            input
        )));
    }

    let candidate = if Path::new(input).is_absolute() {
        PathBuf::from(input)
    } else {
        base.join(input)
    };

    if !policy.allowed_roots.is_empty()
        && !policy
            .allowed_roots
            .iter()
            .any(|root| candidate.starts_with(root))
    {
        return Err(SecurityError::PathRejected(format!(
            "{} is outside the approved roots",
            candidate.display()
        )));
    }

    if !policy.allow_symlinks {
        if let Ok(meta) = std::fs::symlink_metadata(&candidate) {
            if meta.file_type().is_symlink() {
                return Err(SecurityError::PathRejected(format!(
                    "{} is a symlink",
                    candidate.display()
                )));
            }
        }
    }

    Ok(candidate)
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
