// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt construction for step invocations.
//!
//! The step prompt is the exec template with `{input}`, `{task}`, and
//! pipeline-context variables substituted, a contract schema excerpt when
//! one is declared, and the declared-output listing. A checkpoint prefix
//! and a retry repair prompt wrap it when present.

use crate::checkpoint::{inject_checkpoint_prompt, Checkpoint};
use std::collections::HashMap;
use wave_core::Run;
use wave_manifest::{interpolate, ContractType, StepDef};

/// Template variables available to a step.
pub fn template_vars(
    run: &Run,
    step_id: &str,
    task: Option<&str>,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    // The raw payload: strings pass through, structures render as JSON.
    let input_text = match &run.input {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    vars.insert("input".to_string(), input_text);

    // Top-level object keys become addressable as {vars.<key>}; the
    // well-known pipeline-context names stay available bare.
    if let Some(object) = run.input.as_object() {
        for (key, value) in object {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            vars.insert(format!("vars.{key}"), rendered.clone());
            if matches!(key.as_str(), "branch_name" | "feature_number") {
                vars.insert(key.clone(), rendered);
            }
        }
    }

    vars.insert("pipeline_id".to_string(), run.id.to_string());
    vars.insert("pipeline_name".to_string(), run.pipeline_name.clone());
    vars.insert("step_id".to_string(), step_id.to_string());

    if let Some(task) = task {
        vars.insert("task".to_string(), task.to_string());
    }

    vars
}

/// Build the full prompt for one attempt.
pub fn build_prompt(
    step: &StepDef,
    vars: &HashMap<String, String>,
    checkpoint: Option<&Checkpoint>,
    repair_prompt: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if let Some(checkpoint) = checkpoint {
        prompt.push_str(&inject_checkpoint_prompt(checkpoint));
    }

    prompt.push_str(&interpolate(&step.exec.source, vars));

    if !step.output_artifacts.is_empty() {
        prompt.push_str("\n\nDeclared outputs (write these files, paths relative to the working directory):\n");
        for artifact in &step.output_artifacts {
            let required = if artifact.required { "" } else { " (optional)" };
            prompt.push_str(&format!(
                "- {} ({}){}\n",
                artifact.path.display(),
                artifact.artifact_type,
                required
            ));
        }
    }

    if let Some(handover) = &step.handover {
        if handover.contract.contract_type == ContractType::StructuralSchema {
            if let Some(schema) = &handover.contract.schema {
                if let Ok(pretty) = serde_json::to_string_pretty(schema) {
                    prompt.push_str(
                        "\nThe JSON output must conform to this schema exactly:\n```json\n",
                    );
                    prompt.push_str(&pretty);
                    prompt.push_str("\n```\n");
                }
            }
        }
    }

    if let Some(repair) = repair_prompt {
        prompt.push_str("\n\n");
        prompt.push_str(repair);
    }

    prompt
}

/// Combine persona prompt, restriction directives, and contract
/// directives into the projected system prompt.
pub fn build_system_prompt(
    persona_prompt: &str,
    deny_patterns: &[String],
    sandbox_domains: &[String],
    contract_note: Option<&str>,
) -> String {
    let mut out = persona_prompt.trim_end().to_string();
    out.push('\n');

    if !deny_patterns.is_empty() {
        out.push_str("\nRestrictions. The following tools are denied and attempts will be blocked:\n");
        for pattern in deny_patterns {
            out.push_str(&format!("- {pattern}\n"));
        }
    }
    if !sandbox_domains.is_empty() {
        out.push_str("\nNetwork access is limited to these domains:\n");
        for domain in sandbox_domains {
            out.push_str(&format!("- {domain}\n"));
        }
    }
    if let Some(note) = contract_note {
        out.push('\n');
        out.push_str(note);
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
