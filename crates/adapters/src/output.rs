// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured output parsing for headless CLI runs.
//!
//! Expected output is line-delimited JSON records. `assistant` records
//! carry incremental token usage under `message.usage`; the final
//! `result` record carries the result text, completion status, and an
//! aggregate usage block.

use crate::AdapterError;
use wave_core::TokenUsage;

/// Aggregated view over one invocation's structured output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedOutput {
    pub result_text: String,
    pub usage: TokenUsage,
    /// The result record reported an error status.
    pub is_error: bool,
    /// Count of parseable records seen.
    pub records: usize,
}

/// Incremental parser: feed stdout lines as they arrive.
#[derive(Debug, Default)]
pub struct StreamParser {
    usage: TokenUsage,
    result: Option<ResultRecord>,
    records: usize,
    unparseable: usize,
}

#[derive(Debug, Clone)]
struct ResultRecord {
    text: String,
    is_error: bool,
    usage: Option<TokenUsage>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one stdout line. Unparseable lines are tolerated (CLIs
    /// interleave plain diagnostics) but counted.
    pub fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        let json: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                self.unparseable += 1;
                return;
            }
        };
        self.records += 1;

        match json.get("type").and_then(|t| t.as_str()) {
            Some("assistant") => {
                if let Some(usage) = json.get("message").and_then(|m| m.get("usage")) {
                    self.usage.add(&parse_usage(usage));
                }
            }
            Some("result") => {
                let text = json
                    .get("result")
                    .and_then(|r| r.as_str())
                    .unwrap_or_default()
                    .to_string();
                let is_error = json
                    .get("is_error")
                    .and_then(|e| e.as_bool())
                    .unwrap_or_else(|| {
                        json.get("subtype").and_then(|s| s.as_str()) == Some("error")
                    });
                let usage = json.get("usage").map(parse_usage);
                self.result = Some(ResultRecord {
                    text,
                    is_error,
                    usage,
                });
            }
            _ => {}
        }
    }

    /// Cumulative token total so far (for the relay monitor).
    pub fn cumulative_tokens(&self) -> u64 {
        self.usage.total()
    }

    /// Finish parsing. The aggregate usage from the result record wins
    /// over the per-message sum when present.
    pub fn finish(self) -> Result<ParsedOutput, AdapterError> {
        if self.records == 0 {
            return Err(AdapterError::OutputParse(format!(
                "no structured records in output ({} unparseable lines)",
                self.unparseable
            )));
        }
        let result = self.result.ok_or_else(|| {
            AdapterError::OutputParse("output ended without a result record".to_string())
        })?;

        let usage = result.usage.unwrap_or(self.usage);
        Ok(ParsedOutput {
            result_text: result.text,
            usage,
            is_error: result.is_error,
            records: self.records,
        })
    }
}

/// Parse the whole captured stdout at once.
pub fn parse_stream(stdout: &str) -> Result<ParsedOutput, AdapterError> {
    let mut parser = StreamParser::new();
    for line in stdout.lines() {
        parser.push_line(line);
    }
    parser.finish()
}

fn parse_usage(usage: &serde_json::Value) -> TokenUsage {
    let get = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
    TokenUsage {
        input_tokens: get("input_tokens"),
        output_tokens: get("output_tokens"),
        cache_creation_input_tokens: get("cache_creation_input_tokens"),
        cache_read_input_tokens: get("cache_read_input_tokens"),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
