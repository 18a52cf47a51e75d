// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-threshold relay (compaction).
//!
//! When a step's cumulative token usage crosses the configured share of
//! the context window, the scheduler invokes the summarizer persona over
//! the step's transcript and commits a validated checkpoint. Subsequent
//! steps get the checkpoint-injection prefix ahead of their prompts.

use crate::checkpoint::{
    generate_checkpoint, parse_checkpoint, validate_checkpoint_format, Checkpoint, CHECKPOINT_FILE,
};
use crate::error::EngineError;
use std::path::Path;
use std::time::Duration;
use wave_adapters::{AdapterRunner, InvocationRequest, InvocationSignals};
use wave_manifest::{Manifest, RelaySettings};
use wave_security::PermissionSet;

/// Resolved relay configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub threshold_percent: u8,
    pub min_tokens_to_compact: u64,
    pub context_window: u64,
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            threshold_percent: settings.token_threshold_percent,
            min_tokens_to_compact: settings.min_tokens_to_compact,
            context_window: settings.context_window,
        }
    }
}

/// Threshold test: usage must reach the window share *and* the absolute
/// floor — tiny conversations are never worth a summarizer call.
pub fn should_compact(tokens_used: u64, config: &RelayConfig) -> bool {
    let threshold = config.context_window * config.threshold_percent as u64 / 100;
    tokens_used >= threshold && tokens_used >= config.min_tokens_to_compact
}

/// Default prompt handed to the summarizer persona.
const COMPACT_PROMPT: &str = "Summarize the conversation so far into a concise checkpoint. \
     Capture what was accomplished, the key decisions taken, and what remains. \
     Be specific; a later agent resumes from only this summary.";

/// Compaction driver bound to the summarizer persona.
pub struct Compactor<'m, R> {
    manifest: &'m Manifest,
    runner: R,
}

impl<'m, R: AdapterRunner> Compactor<'m, R> {
    pub fn new(manifest: &'m Manifest, runner: R) -> Self {
        Self { manifest, runner }
    }

    /// Summarize `chat_history` and write a validated `checkpoint.md`
    /// into the workspace. On failure no checkpoint is written.
    pub async fn compact(
        &self,
        run_id: &str,
        step_id: &str,
        chat_history: &str,
        workspace: &Path,
        cancelled: bool,
        epoch_ms: u64,
    ) -> Result<String, EngineError> {
        if cancelled {
            return Err(EngineError::Relay("run is cancelled".to_string()));
        }

        let persona_name = self
            .manifest
            .runtime
            .relay
            .summarizer_persona
            .as_deref()
            .ok_or_else(|| EngineError::Relay("no summarizer persona configured".to_string()))?;
        let persona = self
            .manifest
            .personas
            .get(persona_name)
            .ok_or_else(|| EngineError::Relay(format!("unknown persona {persona_name:?}")))?;
        let adapter = self
            .manifest
            .adapters
            .get(&persona.adapter)
            .ok_or_else(|| EngineError::Relay(format!("no adapter for {persona_name:?}")))?;

        // Read-only tools, low temperature: the summarizer must not touch
        // the workspace beyond reading.
        let permissions = PermissionSet::from_patterns(
            &["Read".to_string(), "Grep".to_string(), "Glob".to_string()],
            &[],
        )
        .map_err(EngineError::SecurityRejected)?;

        let prompt = format!("{COMPACT_PROMPT}\n\n---\n\n{chat_history}");
        let request = InvocationRequest {
            run_id: run_id.to_string(),
            step_id: format!("{step_id}.compact"),
            persona: persona_name.to_string(),
            binary: adapter.binary.clone(),
            output_format: adapter.output_format.clone(),
            workspace: workspace.to_path_buf(),
            prompt,
            system_prompt: "You produce terse, factual checkpoint summaries.".to_string(),
            permissions,
            sandbox_domains: Vec::new(),
            env: wave_adapters::curated_env(&[], &[]),
            timeout: Duration::from_secs(300),
            temperature: 0.1,
            max_turns: Some(4),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            project_files: Vec::new(),
        };

        let outcome = self
            .runner
            .invoke(request, InvocationSignals::none())
            .await
            .map_err(|e| EngineError::Relay(format!("summarizer failed: {e}")))?;

        let summary = outcome.result_text.trim().to_string();
        if summary.is_empty() {
            return Err(EngineError::Relay("summarizer returned no text".to_string()));
        }

        let document = generate_checkpoint("Checkpoint", &summary, &[], epoch_ms);
        validate_checkpoint_format(&document)
            .map_err(|e| EngineError::CheckpointInvalid(e.to_string()))?;

        let path = workspace.join(CHECKPOINT_FILE);
        std::fs::write(&path, &document)
            .map_err(|e| EngineError::Relay(format!("write checkpoint: {e}")))?;

        tracing::info!(
            run_id,
            step_id,
            tokens = outcome.usage.total(),
            checkpoint = %path.display(),
            "compaction complete"
        );

        Ok(summary)
    }
}

/// Read and parse an existing checkpoint from a workspace.
pub fn load_checkpoint(workspace: &Path) -> Result<Option<Checkpoint>, EngineError> {
    let path = workspace.join(CHECKPOINT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| EngineError::Relay(format!("read checkpoint: {e}")))?;
    let checkpoint =
        parse_checkpoint(&text).map_err(|e| EngineError::CheckpointInvalid(e.to_string()))?;
    Ok(Some(checkpoint))
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
