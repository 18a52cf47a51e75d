// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-security: input validation and permission enforcement
//!
//! Four independent concerns, all stateless:
//! - path validation (traversal markers, allow-listed roots, symlink refusal)
//! - prompt-input sanitization with a risk score
//! - credential scrubbing for anything that gets persisted
//! - tool-permission matching with deny-wins semantics

pub mod path;
pub mod permission;
pub mod sanitize;
pub mod scrub;

pub use path::{validate_path, PathPolicy};
pub use permission::{PermissionDecision, PermissionSet, ToolPattern};
pub use sanitize::{sanitize_input, SanitizeMode, SanitizeReport};
pub use scrub::{contains_credentials, scrub_credentials, REDACTION_MARKER};

use thiserror::Error;

/// Security rejections, surfaced to callers with the offending detail.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("path rejected: {0}")]
    PathRejected(String),
    #[error("input rejected: prompt injection detected ({0})")]
    InjectionDetected(String),
    #[error("permission denied for {tool}({arg})")]
    PermissionDenied { tool: String, arg: String },
    #[error("invalid permission pattern: {0}")]
    InvalidPattern(String),
}
