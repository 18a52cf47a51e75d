// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event emission: one fan-out point for all progress events.
//!
//! Every event is persisted to the event log and mirrored as a JSON line
//! to the run's event stream file. Messages are scrubbed in the store
//! layer; the stream mirror scrubs here so both sinks only ever see
//! redacted text.

use crate::error::EngineError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use wave_core::ProgressEvent;
use wave_security::scrub_credentials;
use wave_storage::StateStore;

/// Fans progress events out to the state store and the stream file.
#[derive(Clone)]
pub struct EventEmitter {
    store: Arc<StateStore>,
    /// Directory holding per-run `<run_id>.jsonl` stream files.
    stream_dir: Option<PathBuf>,
}

impl EventEmitter {
    pub fn new(store: Arc<StateStore>, stream_dir: Option<PathBuf>) -> Self {
        Self { store, stream_dir }
    }

    /// Emit one event to every sink.
    pub async fn emit(&self, mut event: ProgressEvent) -> Result<(), EngineError> {
        if let Some(message) = event.message.take() {
            event.message = Some(scrub_credentials(&message));
        }

        tracing::debug!(
            run_id = %event.run_id,
            step_id = event.step_id.as_ref().map(|s| s.as_str()).unwrap_or("-"),
            state = %event.state,
            "event"
        );

        if let Some(dir) = &self.stream_dir {
            if let Err(e) = self.append_stream_line(dir.clone(), &event) {
                // The durable copy is the store; a stream hiccup is not
                // worth failing the step over.
                tracing::warn!(error = %e, "event stream write failed");
            }
        }

        self.store.append_event(&event).await?;
        Ok(())
    }

    fn append_stream_line(&self, dir: PathBuf, event: &ProgressEvent) -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.jsonl", event.run_id));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
