// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only redacted audit trace.
//!
//! One file per process lifetime, named `trace-<YYYYMMDD-HHMMSS>.log`.
//! Every line passes through the credential scrubber before it touches
//! disk; the unredacted text never persists.

use crate::StorageError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use wave_core::{compact_utc, iso_utc};
use wave_security::scrub_credentials;

/// Append-only audit logger.
pub struct TraceLogger {
    path: PathBuf,
    log_tool_calls: bool,
    log_file_operations: bool,
}

impl TraceLogger {
    /// Create a trace file under `log_dir`, stamped with the start time.
    pub fn create(
        log_dir: &Path,
        start_epoch_ms: u64,
        log_tool_calls: bool,
        log_file_operations: bool,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("trace-{}.log", compact_utc(start_epoch_ms)));
        Ok(Self {
            path,
            log_tool_calls,
            log_file_operations,
        })
    }

    /// Path of the trace file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one redacted line: `<iso-ts> [category] message`.
    ///
    /// Each append opens, writes, and closes the file; write frequency is
    /// low enough that the simplicity wins.
    pub fn append(&self, epoch_ms: u64, category: &str, message: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let scrubbed = scrub_credentials(message);
        writeln!(file, "{} [{}] {}", iso_utc(epoch_ms), category, scrubbed)?;
        Ok(())
    }

    /// Record a tool call, if tool-call auditing is on.
    pub fn tool_call(
        &self,
        epoch_ms: u64,
        run_id: &str,
        step_id: &str,
        tool: &str,
        arg: &str,
        decision: &str,
    ) -> Result<(), StorageError> {
        if !self.log_tool_calls {
            return Ok(());
        }
        self.append(
            epoch_ms,
            "tool",
            &format!("{run_id}/{step_id} {tool}({arg}) -> {decision}"),
        )
    }

    /// Record a file operation, if file-operation auditing is on.
    pub fn file_operation(
        &self,
        epoch_ms: u64,
        run_id: &str,
        step_id: &str,
        operation: &str,
        path: &Path,
    ) -> Result<(), StorageError> {
        if !self.log_file_operations {
            return Ok(());
        }
        self.append(
            epoch_ms,
            "file",
            &format!("{run_id}/{step_id} {operation} {}", path.display()),
        )
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
