// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless adapter runner.
//!
//! Launch sequence per invocation:
//! 1. project settings + system prompt + base project files into the workspace
//! 2. run pre-hooks (non-zero exit blocks the step)
//! 3. spawn the CLI in a fresh process group with the curated environment
//! 4. stream stdout, parsing structured records as they arrive
//! 5. race the exit against the timeout; on expiry kill the whole group
//! 6. run post-hooks (advisory)

use crate::output::StreamParser;
use crate::process::{kill_process_group, run_with_timeout, set_process_group, HOOK_TIMEOUT};
use crate::settings::{copy_project_files, write_settings, write_system_prompt};
use crate::{AdapterError, AdapterRunner, InvocationOutcome, InvocationRequest, InvocationSignals};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

/// Resolve when the watched flag flips true; pend forever otherwise.
async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

/// Known CLI families. A closed set: new adapter styles are added here,
/// not discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    ClaudeStyle,
    OpenCodeStyle,
    Custom,
}

impl AdapterKind {
    /// Choose the invocation shape from the binary's basename.
    pub fn from_binary(binary: &str) -> Self {
        let base = binary.rsplit('/').next().unwrap_or(binary);
        if base.starts_with("claude") {
            AdapterKind::ClaudeStyle
        } else if base.starts_with("opencode") {
            AdapterKind::OpenCodeStyle
        } else {
            AdapterKind::Custom
        }
    }
}

/// Production adapter runner for headless LLM CLIs.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRunner;

impl HeadlessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Build the argument vector for the CLI family.
    fn build_args(
        kind: AdapterKind,
        request: &InvocationRequest,
        settings_path: &std::path::Path,
    ) -> Vec<String> {
        let allow: Vec<String> = request
            .permissions
            .allow_patterns()
            .map(str::to_string)
            .collect();
        let deny: Vec<String> = request
            .permissions
            .deny_patterns()
            .map(str::to_string)
            .collect();

        match kind {
            AdapterKind::ClaudeStyle => {
                let mut args = vec![
                    "-p".to_string(),
                    request.prompt.clone(),
                    "--output-format".to_string(),
                    request.output_format.clone(),
                    "--verbose".to_string(),
                    "--settings".to_string(),
                    settings_path.display().to_string(),
                    "--append-system-prompt".to_string(),
                    request.system_prompt.clone(),
                ];
                if !allow.is_empty() {
                    args.push("--allowed-tools".to_string());
                    args.push(allow.join(","));
                }
                if !deny.is_empty() {
                    args.push("--disallowed-tools".to_string());
                    args.push(deny.join(","));
                }
                if let Some(turns) = request.max_turns {
                    args.push("--max-turns".to_string());
                    args.push(turns.to_string());
                }
                args
            }
            AdapterKind::OpenCodeStyle => vec![
                "run".to_string(),
                "--format".to_string(),
                "json".to_string(),
                request.prompt.clone(),
            ],
            AdapterKind::Custom => vec![request.prompt.clone()],
        }
    }

    /// Run hook commands in the workspace. `blocking` hooks fail the
    /// invocation on non-zero exit; advisory hooks only report.
    async fn run_hooks(
        request: &InvocationRequest,
        hooks: &[String],
        blocking: bool,
    ) -> Result<Vec<String>, AdapterError> {
        let mut warnings = Vec::new();
        for hook in hooks {
            let mut cmd = Command::new("bash");
            cmd.arg("-c")
                .arg(hook)
                .current_dir(&request.workspace)
                .env_clear()
                .envs(request.env.iter().cloned());

            let output = run_with_timeout(cmd, HOOK_TIMEOUT, "hook").await;
            let code = match output {
                Ok(out) if out.status.success() => continue,
                Ok(out) => out.status.code().unwrap_or(-1),
                Err(message) => {
                    if blocking {
                        return Err(AdapterError::HookBlocked {
                            hook: hook.clone(),
                            code: -1,
                        });
                    }
                    warnings.push(format!("post-hook {hook:?} failed: {message}"));
                    continue;
                }
            };
            if blocking {
                return Err(AdapterError::HookBlocked {
                    hook: hook.clone(),
                    code,
                });
            }
            tracing::warn!(%hook, code, "post-hook exited non-zero (advisory)");
            warnings.push(format!("post-hook {hook:?} exited {code}"));
        }
        Ok(warnings)
    }
}

#[async_trait]
impl AdapterRunner for HeadlessRunner {
    async fn invoke(
        &self,
        request: InvocationRequest,
        signals: InvocationSignals,
    ) -> Result<InvocationOutcome, AdapterError> {
        let InvocationSignals {
            usage_tx,
            mut cancel_rx,
        } = signals;
        let kind = AdapterKind::from_binary(&request.binary);
        let start = Instant::now();

        // 1. Projection
        let settings_path = write_settings(kind, &request)?;
        write_system_prompt(&request.workspace, &request.system_prompt)?;
        copy_project_files(&request.workspace, &request.project_files)?;

        // 2. Pre-hooks (policy gate)
        Self::run_hooks(&request, &request.pre_hooks, true).await?;

        // 3. Launch
        let args = Self::build_args(kind, &request, &settings_path);
        let mut cmd = Command::new(&request.binary);
        cmd.args(&args)
            .current_dir(&request.workspace)
            .env_clear()
            .envs(request.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        set_process_group(&mut cmd);

        tracing::info!(
            run_id = %request.run_id,
            step_id = %request.step_id,
            persona = %request.persona,
            binary = %request.binary,
            workspace = %request.workspace.display(),
            "spawning adapter"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AdapterError::BinaryNotFound(request.binary.clone())
            } else {
                AdapterError::SpawnFailed(e.to_string())
            }
        })?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdapterError::SpawnFailed("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AdapterError::SpawnFailed("stderr not captured".to_string()))?;

        // 4. Stream stdout while waiting, bounded by the timeout.
        let mut parser = StreamParser::new();
        let mut lines = BufReader::new(stdout).lines();
        let deadline = tokio::time::sleep(request.timeout);
        tokio::pin!(deadline);

        let mut stdout_done = false;
        let status = loop {
            tokio::select! {
                line = lines.next_line(), if !stdout_done => {
                    match line {
                        Ok(Some(line)) => {
                            parser.push_line(&line);
                            if let Some(tx) = &usage_tx {
                                let _ = tx.try_send(parser.cumulative_tokens());
                            }
                        }
                        Ok(None) => stdout_done = true,
                        Err(e) => {
                            tracing::warn!(error = %e, "stdout read error");
                            stdout_done = true;
                        }
                    }
                }
                status = child.wait() => {
                    break status.map_err(|e| AdapterError::Crash(e.to_string()))?;
                }
                () = &mut deadline => {
                    if let Some(pid) = pid {
                        kill_process_group(pid);
                    }
                    let _ = child.wait().await;
                    tracing::error!(
                        run_id = %request.run_id,
                        step_id = %request.step_id,
                        timeout_s = request.timeout.as_secs(),
                        "adapter timed out, process group killed"
                    );
                    return Err(AdapterError::Timeout(request.timeout.as_secs()));
                }
                () = cancelled(&mut cancel_rx) => {
                    if let Some(pid) = pid {
                        kill_process_group(pid);
                    }
                    let _ = child.wait().await;
                    tracing::warn!(
                        run_id = %request.run_id,
                        step_id = %request.step_id,
                        "force cancellation, process group killed"
                    );
                    return Err(AdapterError::Cancelled);
                }
            }
        };

        // Drain whatever stdout remains after exit.
        while let Ok(Some(line)) = lines.next_line().await {
            parser.push_line(&line);
        }
        let mut stderr_buf = String::new();
        let _ = stderr.read_to_string(&mut stderr_buf).await;

        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            if status.code().is_none() {
                // Killed by a signal without our timeout firing.
                return Err(AdapterError::Crash(format!(
                    "terminated by signal; stderr: {}",
                    tail(&stderr_buf, 5)
                )));
            }
            return Err(AdapterError::NonZeroExit {
                code,
                stderr_tail: tail(&stderr_buf, 10),
            });
        }

        // 5. Output parsing
        let parsed = parser.finish()?;
        if parsed.is_error {
            return Err(AdapterError::Crash(format!(
                "adapter reported error result: {}",
                parsed.result_text
            )));
        }

        // 6. Post-hooks (advisory)
        let post_hook_warnings = Self::run_hooks(&request, &request.post_hooks, false).await?;

        tracing::info!(
            run_id = %request.run_id,
            step_id = %request.step_id,
            duration_ms,
            tokens = parsed.usage.total(),
            records = parsed.records,
            "adapter completed"
        );

        Ok(InvocationOutcome {
            result_text: parsed.result_text,
            usage: parsed.usage,
            duration_ms,
            records: parsed.records,
            post_hook_warnings,
        })
    }
}

fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
#[path = "headless_tests.rs"]
mod tests;
