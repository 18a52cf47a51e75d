// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-permission matching with deny-wins semantics.
//!
//! Patterns have the shape `Tool` or `Tool(arg-glob)`:
//! - `Bash(git *)` — Bash invocations whose argument matches `git *`
//! - `Read` — any Read invocation
//! - `WebFetch(*)` — any WebFetch with an argument
//!
//! Evaluation order for a proposed call `(tool, arg)`:
//! 1. any deny pattern matches  -> deny
//! 2. no allow patterns declared -> allow
//! 3. any allow pattern matches  -> allow
//! 4. otherwise                  -> deny

use crate::SecurityError;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed permission pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPattern {
    tool: String,
    arg_glob: Option<Pattern>,
    /// Original text, kept for display and serialization.
    raw: String,
}

impl ToolPattern {
    /// Parse a pattern of shape `Tool` or `Tool(arg-glob)`.
    pub fn parse(raw: &str) -> Result<Self, SecurityError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SecurityError::InvalidPattern("empty pattern".to_string()));
        }

        let (tool, arg_glob) = match raw.find('(') {
            Some(open) => {
                if !raw.ends_with(')') {
                    return Err(SecurityError::InvalidPattern(format!(
                        "unterminated argument glob in {:?}",
                        raw
                    )));
                }
                let tool = &raw[..open];
                let glob_src = &raw[open + 1..raw.len() - 1];
                let pattern = Pattern::new(glob_src).map_err(|e| {
                    SecurityError::InvalidPattern(format!("bad glob in {:?}: {}", raw, e))
                })?;
                (tool, Some(pattern))
            }
            None => (raw, None),
        };

        if tool.is_empty() || !tool.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SecurityError::InvalidPattern(format!(
                "invalid tool name in {:?}",
                raw
            )));
        }

        Ok(Self {
            tool: tool.to_string(),
            arg_glob,
            raw: raw.to_string(),
        })
    }

    /// Whether the pattern matches a proposed `(tool, arg)` call.
    ///
    /// A bare `Tool` pattern matches any argument; `Tool(glob)` requires
    /// the argument to match the glob.
    pub fn matches(&self, tool: &str, arg: &str) -> bool {
        if self.tool != tool {
            return false;
        }
        match &self.arg_glob {
            None => true,
            Some(glob) => glob.matches(arg),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ToolPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ToolPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ToolPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ToolPattern::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Decision for a proposed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// Effective permission set for one step invocation.
///
/// Built as (adapter defaults ∪ persona allows) with the deny lists
/// concatenated; denies from either source always win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    allow: Vec<ToolPattern>,
    deny: Vec<ToolPattern>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse allow/deny pattern lists into a set.
    pub fn from_patterns(allow: &[String], deny: &[String]) -> Result<Self, SecurityError> {
        let allow = allow
            .iter()
            .map(|p| ToolPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let deny = deny
            .iter()
            .map(|p| ToolPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { allow, deny })
    }

    /// Merge another set into this one (adapter defaults ∪ persona set).
    pub fn merge(mut self, other: PermissionSet) -> Self {
        self.allow.extend(other.allow);
        self.deny.extend(other.deny);
        self
    }

    /// Evaluate a proposed tool call. Deny always wins.
    pub fn evaluate(&self, tool: &str, arg: &str) -> PermissionDecision {
        if self.deny.iter().any(|p| p.matches(tool, arg)) {
            return PermissionDecision::Deny;
        }
        if self.allow.is_empty() {
            return PermissionDecision::Allow;
        }
        if self.allow.iter().any(|p| p.matches(tool, arg)) {
            return PermissionDecision::Allow;
        }
        PermissionDecision::Deny
    }

    /// Allow patterns in declaration order (for settings projection).
    pub fn allow_patterns(&self) -> impl Iterator<Item = &str> {
        self.allow.iter().map(|p| p.as_str())
    }

    /// Deny patterns in declaration order (for settings projection).
    pub fn deny_patterns(&self) -> impl Iterator<Item = &str> {
        self.deny.iter().map(|p| p.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
