// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint documents written during relay compaction.
//!
//! A checkpoint is human-readable markdown with a mandatory title and
//! Summary section, an optional Decisions list, and an optional
//! generated-at marker. Validation runs before a checkpoint is committed
//! to a workspace and again when one is parsed back for injection.

use thiserror::Error;
use wave_core::iso_utc;

/// File name of a checkpoint inside a workspace.
pub const CHECKPOINT_FILE: &str = "checkpoint.md";

/// Checkpoint validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint not found")]
    NotFound,
    #[error("checkpoint is empty")]
    Empty,
    #[error("checkpoint missing title header")]
    MissingHeader,
    #[error("checkpoint summary is empty")]
    EmptySummary,
}

/// Parsed checkpoint document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub title: String,
    pub summary: String,
    pub decisions: Vec<String>,
    pub generated_at: Option<String>,
}

/// Validate the mandatory structure without building the document.
pub fn validate_checkpoint_format(text: &str) -> Result<(), CheckpointError> {
    parse_checkpoint(text).map(|_| ())
}

/// Parse a checkpoint document.
pub fn parse_checkpoint(text: &str) -> Result<Checkpoint, CheckpointError> {
    if text.trim().is_empty() {
        return Err(CheckpointError::Empty);
    }

    let mut title = None;
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut decisions = Vec::new();
    let mut generated_at = None;
    let mut section = "";

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            if title.is_none() {
                title = Some(heading.trim().to_string());
            }
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("## ") {
            section = match heading.trim() {
                "Summary" => "summary",
                "Decisions" => "decisions",
                _ => "",
            };
            continue;
        }
        if let Some(marker) = trimmed.strip_prefix("_Generated at ") {
            generated_at = Some(marker.trim_end_matches('_').trim().to_string());
            continue;
        }
        match section {
            "summary" => {
                if !trimmed.is_empty() {
                    summary_lines.push(trimmed);
                }
            }
            "decisions" => {
                if let Some(item) = trimmed.strip_prefix("- ") {
                    decisions.push(item.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let title = title.ok_or(CheckpointError::MissingHeader)?;
    if title.is_empty() {
        return Err(CheckpointError::MissingHeader);
    }
    let summary = summary_lines.join("\n");
    if summary.is_empty() {
        return Err(CheckpointError::EmptySummary);
    }

    Ok(Checkpoint {
        title,
        summary,
        decisions,
        generated_at,
    })
}

/// Render a checkpoint document.
pub fn generate_checkpoint(
    title: &str,
    summary: &str,
    decisions: &[String],
    epoch_ms: u64,
) -> String {
    let mut out = format!("# {title}\n\n## Summary\n{}\n", summary.trim());
    if !decisions.is_empty() {
        out.push_str("\n## Decisions\n");
        for decision in decisions {
            out.push_str(&format!("- {decision}\n"));
        }
    }
    out.push_str(&format!("\n_Generated at {}_\n", iso_utc(epoch_ms)));
    out
}

/// Synthesize the prompt prefix injected ahead of the next step's prompt.
pub fn inject_checkpoint_prompt(checkpoint: &Checkpoint) -> String {
    let mut prefix = format!(
        "A previous stage of this pipeline was summarized to stay within the \
         context budget. Resume from this checkpoint:\n\n## {}\n\n{}\n",
        checkpoint.title, checkpoint.summary
    );
    if !checkpoint.decisions.is_empty() {
        prefix.push_str("\nDecisions already made (do not revisit):\n");
        for decision in &checkpoint.decisions {
            prefix.push_str(&format!("- {decision}\n"));
        }
    }
    prefix.push('\n');
    prefix
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
