// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project manifest model.
//!
//! One manifest per project: declared adapters, personas bound to them,
//! and runtime settings shared by every pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub adapters: IndexMap<String, AdapterDef>,
    #[serde(default)]
    pub personas: IndexMap<String, PersonaDef>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub skill_mounts: Vec<SkillMount>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Subprocess contract for one LLM CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDef {
    /// Executable name, resolved on the host search path at run time.
    pub binary: String,
    /// Always "headless"; kept as data so a manifest that asks for
    /// anything else fails validation loudly.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Expected structured output encoding (`stream-json` by default).
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Base project files copied into every workspace for this adapter.
    #[serde(default)]
    pub project_files: Vec<String>,
    #[serde(default)]
    pub default_permissions: PermissionPatterns,
    #[serde(default)]
    pub hooks_template_dir: Option<PathBuf>,
}

fn default_mode() -> String {
    "headless".to_string()
}

fn default_output_format() -> String {
    "stream-json".to_string()
}

/// Allow/deny pattern lists as written in the manifest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PermissionPatterns {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Role binding: prompt + permissions + adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaDef {
    /// Name of a declared adapter. Must resolve.
    pub adapter: String,
    pub system_prompt_file: PathBuf,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub permissions: PermissionPatterns,
    #[serde(default)]
    pub hooks: Option<HooksDef>,
    #[serde(default)]
    pub sandbox: Option<SandboxDef>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Hook scripts run around tool calls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HooksDef {
    #[serde(default, rename = "PreToolUse")]
    pub pre_tool_use: Vec<String>,
    #[serde(default, rename = "PostToolUse")]
    pub post_tool_use: Vec<String>,
}

/// Network and environment scoping for a persona.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SandboxDef {
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Extra environment variables forwarded from the host, by name.
    #[serde(default)]
    pub env_passthrough: Vec<String>,
}

/// Runtime settings shared across pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,
    #[serde(default = "default_timeout_minutes")]
    pub default_timeout_minutes: u64,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            max_concurrent_workers: default_max_concurrent_workers(),
            default_timeout_minutes: default_timeout_minutes(),
            relay: RelaySettings::default(),
            audit: AuditSettings::default(),
            routing: RoutingConfig::default(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("workspaces")
}

fn default_max_concurrent_workers() -> usize {
    4
}

fn default_timeout_minutes() -> u64 {
    30
}

/// Token-threshold relay (compaction) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_threshold_percent")]
    pub token_threshold_percent: u8,
    #[serde(default = "default_min_tokens")]
    pub min_tokens_to_compact: u64,
    #[serde(default = "default_context_window")]
    pub context_window: u64,
    #[serde(default)]
    pub summarizer_persona: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            token_threshold_percent: default_threshold_percent(),
            min_tokens_to_compact: default_min_tokens(),
            context_window: default_context_window(),
            summarizer_persona: None,
        }
    }
}

fn default_threshold_percent() -> u8 {
    70
}

fn default_min_tokens() -> u64 {
    1000
}

fn default_context_window() -> u64 {
    200_000
}

/// Audit trace settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_true")]
    pub log_all_tool_calls: bool,
    #[serde(default = "default_true")]
    pub log_all_file_operations: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_all_tool_calls: true,
            log_all_file_operations: true,
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("traces")
}

fn default_true() -> bool {
    true
}

/// Persona routing: which persona handles a pipeline input by default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

/// A single routing rule: inputs matching `pattern` go to `persona`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub pattern: String,
    pub persona: String,
}

/// A shared skill directory mounted read-only into workspaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMount {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
