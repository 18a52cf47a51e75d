// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings and system-prompt projection into the workspace.
//!
//! Each invocation gets an adapter-specific settings file carrying the
//! effective permissions, sandbox domains, and hook commands, plus a
//! system-prompt file. Both live in the workspace root so the audit of a
//! run is self-contained.

use crate::headless::AdapterKind;
use crate::{AdapterError, InvocationRequest};
use serde_json::json;
use std::path::{Path, PathBuf};

/// File name of the projected settings for an adapter kind.
pub fn settings_file_name(kind: AdapterKind) -> &'static str {
    match kind {
        AdapterKind::ClaudeStyle => "claude-settings.json",
        AdapterKind::OpenCodeStyle => "opencode.json",
        AdapterKind::Custom => "adapter-settings.json",
    }
}

/// File name of the projected system prompt.
pub const SYSTEM_PROMPT_FILE: &str = "system-prompt.md";

/// Write the settings file for one invocation; returns its path.
pub fn write_settings(
    kind: AdapterKind,
    request: &InvocationRequest,
) -> Result<PathBuf, AdapterError> {
    let allow: Vec<&str> = request.permissions.allow_patterns().collect();
    let deny: Vec<&str> = request.permissions.deny_patterns().collect();

    let mut settings = json!({
        "permissions": {
            "allow": allow,
            "deny": deny,
        },
        "temperature": request.temperature,
    });

    if !request.sandbox_domains.is_empty() {
        settings["sandbox"] = json!({ "allowed_domains": request.sandbox_domains });
    }

    if !request.pre_hooks.is_empty() || !request.post_hooks.is_empty() {
        let entry = |commands: &[String]| -> serde_json::Value {
            json!([{
                "matcher": "",
                "hooks": commands
                    .iter()
                    .map(|c| json!({"type": "command", "command": c}))
                    .collect::<Vec<_>>(),
            }])
        };
        let mut hooks = json!({});
        if !request.pre_hooks.is_empty() {
            hooks["PreToolUse"] = entry(&request.pre_hooks);
        }
        if !request.post_hooks.is_empty() {
            hooks["PostToolUse"] = entry(&request.post_hooks);
        }
        settings["hooks"] = hooks;
    }

    let path = request.workspace.join(settings_file_name(kind));
    let text = serde_json::to_string_pretty(&settings)
        .map_err(|e| AdapterError::Workspace(e.to_string()))?;
    std::fs::write(&path, text).map_err(|e| AdapterError::Workspace(e.to_string()))?;
    Ok(path)
}

/// Write the combined system prompt; returns its path.
pub fn write_system_prompt(workspace: &Path, content: &str) -> Result<PathBuf, AdapterError> {
    let path = workspace.join(SYSTEM_PROMPT_FILE);
    std::fs::write(&path, content).map_err(|e| AdapterError::Workspace(e.to_string()))?;
    Ok(path)
}

/// Copy the adapter's base project files into the workspace.
///
/// Sources are absolute paths resolved by the engine; each lands under
/// its file name in the workspace root. A missing source is an error —
/// the manifest declared it, so its absence is a misconfiguration.
pub fn copy_project_files(workspace: &Path, files: &[PathBuf]) -> Result<(), AdapterError> {
    for source in files {
        let name = source
            .file_name()
            .ok_or_else(|| AdapterError::Workspace(format!("bad project file {}", source.display())))?;
        let target = workspace.join(name);
        std::fs::copy(source, &target).map_err(|e| {
            AdapterError::Workspace(format!("copy {} failed: {}", source.display(), e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
