// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite state store.
//!
//! Single-writer discipline: every write goes through a one-connection
//! pool, serializing transactions; reads use a separate pool and see WAL
//! snapshots. An exclusive lock file on the state root keeps a second
//! process from opening the store for writing.

use crate::StorageError;
use fs2::FileExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use wave_core::{
    ArtifactRecord, ArtifactType, EventState, ProgressEvent, Run, RunId, RunStatus, StepExecution,
    StepId, StepState,
};

/// Busy timeout for concurrent access to the SQLite file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Embedded forward-only migrations, applied in order at startup.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../migrations/0001_init.sql"))];

/// Filter for `list_runs`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<RunStatus>,
    pub pipeline_name: Option<String>,
    pub tag: Option<(String, String)>,
    pub limit: Option<u32>,
}

/// One performance-metric row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceMetric {
    pub run_id: RunId,
    pub step_id: StepId,
    pub pipeline_name: String,
    pub persona: Option<String>,
    pub duration_ms: u64,
    pub tokens_used: u64,
    pub files_modified: u64,
    pub artifacts_generated: u64,
}

/// Durable store for runs, steps, events, artifacts, and cancellations.
pub struct StateStore {
    writer: Pool<Sqlite>,
    reader: Pool<Sqlite>,
    /// Held for the lifetime of the store; releasing it frees the root.
    _lock: File,
}

impl StateStore {
    /// Open (or create) the store under `data_root`.
    ///
    /// Fails fast when another process holds the writer lock or the
    /// database cannot be opened — per the failure model, the caller
    /// should not start a run without a store.
    pub async fn open(data_root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_root)?;

        let lock_path = data_root.join("state.lock");
        let lock = File::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StorageError::Locked(lock_path.display().to_string()))?;

        let db_path = data_root.join("state.db");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        let reader = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self {
            writer,
            reader,
            _lock: lock,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending migrations, forward-only.
    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.writer)
            .await?;

        let applied: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
                .fetch_all(&self.writer)
                .await?;

        for (version, sql) in MIGRATIONS {
            if applied.contains(version) {
                continue;
            }
            tracing::info!(version, "applying migration");
            for statement in sql.split(';') {
                let trimmed: String = statement
                    .lines()
                    .filter(|line| !line.trim_start().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n");
                if trimmed.trim().is_empty() {
                    continue;
                }
                sqlx::query(&trimmed).execute(&self.writer).await?;
            }
            sqlx::query("INSERT OR IGNORE INTO schema_migrations (version) VALUES (?1)")
                .bind(version)
                .execute(&self.writer)
                .await?;
        }
        Ok(())
    }

    // --- Run operations ---

    /// Insert a new run record. Idempotent on the run id.
    pub async fn insert_run(&self, run: &Run, pipeline_hash: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR REPLACE INTO pipeline_run \
             (run_id, pipeline_name, status, input, current_step, total_tokens, pipeline_hash, \
              created_at, started_at, completed_at, error_message, tags_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(run.id.as_str())
        .bind(&run.pipeline_name)
        .bind(run.status.as_str())
        .bind(run.input.to_string())
        .bind(&run.current_step)
        .bind(run.total_tokens as i64)
        .bind(pipeline_hash)
        .bind(run.created_at_ms as i64)
        .bind(run.started_at_ms.map(|v| v as i64))
        .bind(run.completed_at_ms.map(|v| v as i64))
        .bind(&run.error)
        .bind(serde_json::to_string(&run.tags)?)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Persist the run's current status, progress pointer, and totals.
    pub async fn update_run(&self, run: &Run) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE pipeline_run SET status = ?2, current_step = ?3, total_tokens = ?4, \
             started_at = ?5, completed_at = ?6, error_message = ?7 WHERE run_id = ?1",
        )
        .bind(run.id.as_str())
        .bind(run.status.as_str())
        .bind(&run.current_step)
        .bind(run.total_tokens as i64)
        .bind(run.started_at_ms.map(|v| v as i64))
        .bind(run.completed_at_ms.map(|v| v as i64))
        .bind(&run.error)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Load a run by id.
    pub async fn get_run(&self, run_id: &RunId) -> Result<Run, StorageError> {
        let row = sqlx::query(
            "SELECT run_id, pipeline_name, status, input, current_step, total_tokens, \
             created_at, started_at, completed_at, error_message, tags_json \
             FROM pipeline_run WHERE run_id = ?1",
        )
        .bind(run_id.as_str())
        .fetch_optional(&self.reader)
        .await?
        .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))?;

        row_to_run(&row)
    }

    /// The stored pipeline-content hash for a run (drift detection on resume).
    pub async fn get_pipeline_hash(&self, run_id: &RunId) -> Result<Option<String>, StorageError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT pipeline_hash FROM pipeline_run WHERE run_id = ?1")
                .bind(run_id.as_str())
                .fetch_optional(&self.reader)
                .await?
                .flatten();
        Ok(hash)
    }

    /// List runs matching the filter, newest first.
    pub async fn list_runs(&self, filter: &ListFilter) -> Result<Vec<Run>, StorageError> {
        let rows = sqlx::query(
            "SELECT run_id, pipeline_name, status, input, current_step, total_tokens, \
             created_at, started_at, completed_at, error_message, tags_json \
             FROM pipeline_run ORDER BY created_at DESC",
        )
        .fetch_all(&self.reader)
        .await?;

        let mut runs = Vec::new();
        for row in &rows {
            let run = row_to_run(row)?;
            if let Some(status) = filter.status {
                if run.status != status {
                    continue;
                }
            }
            if let Some(name) = &filter.pipeline_name {
                if &run.pipeline_name != name {
                    continue;
                }
            }
            if let Some((key, value)) = &filter.tag {
                if run.tags.get(key) != Some(value) {
                    continue;
                }
            }
            runs.push(run);
            if let Some(limit) = filter.limit {
                if runs.len() >= limit as usize {
                    break;
                }
            }
        }
        Ok(runs)
    }

    /// Delete a run and all its dependent rows.
    pub async fn delete_run(&self, run_id: &RunId) -> Result<(), StorageError> {
        let mut tx = self.writer.begin().await?;
        for table in [
            "event_log",
            "artifact",
            "performance_metric",
            "step_progress",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE run_id = ?1"))
                .bind(run_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM pipeline_progress WHERE run_id = ?1")
            .bind(run_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cancellation WHERE run_id = ?1")
            .bind(run_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM step_state WHERE run_id = ?1")
            .bind(run_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pipeline_run WHERE run_id = ?1")
            .bind(run_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record the latest status per pipeline name.
    pub async fn upsert_pipeline_state(
        &self,
        pipeline_name: &str,
        status: RunStatus,
        input: &serde_json::Value,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO pipeline_state (pipeline_id, name, status, input, created_at, updated_at) \
             VALUES (?1, ?1, ?2, ?3, ?4, ?4) \
             ON CONFLICT(pipeline_id) DO UPDATE SET status = ?2, input = ?3, updated_at = ?4",
        )
        .bind(pipeline_name)
        .bind(status.as_str())
        .bind(input.to_string())
        .bind(now_ms as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    // --- Step operations ---

    /// Upsert one step execution record.
    pub async fn upsert_step(&self, step: &StepExecution) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO step_state \
             (run_id, step_id, state, retry_count, workspace_path, tokens_used, \
              started_at, completed_at, error_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(run_id, step_id) DO UPDATE SET \
             state = ?3, retry_count = ?4, workspace_path = ?5, tokens_used = ?6, \
             started_at = ?7, completed_at = ?8, error_message = ?9",
        )
        .bind(step.run_id.as_str())
        .bind(step.step_id.as_str())
        .bind(step.state.as_str())
        .bind(step.retry_count as i64)
        .bind(step.workspace_path.as_ref().map(|p| p.display().to_string()))
        .bind(step.tokens_used as i64)
        .bind(step.started_at_ms.map(|v| v as i64))
        .bind(step.completed_at_ms.map(|v| v as i64))
        .bind(&step.error)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Load all step records for a run.
    pub async fn get_steps(&self, run_id: &RunId) -> Result<Vec<StepExecution>, StorageError> {
        let rows = sqlx::query(
            "SELECT run_id, step_id, state, retry_count, workspace_path, tokens_used, \
             started_at, completed_at, error_message \
             FROM step_state WHERE run_id = ?1 ORDER BY started_at",
        )
        .bind(run_id.as_str())
        .fetch_all(&self.reader)
        .await?;

        rows.iter().map(row_to_step).collect()
    }

    // --- Event operations ---

    /// Append one progress event. The message is scrubbed before it is
    /// persisted; the raw text never reaches disk.
    pub async fn append_event(&self, event: &ProgressEvent) -> Result<(), StorageError> {
        let message = event
            .message
            .as_deref()
            .map(wave_security::scrub_credentials);
        let artifacts = event
            .artifacts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO event_log \
             (run_id, timestamp, step_id, state, persona, message, artifacts, tokens_used, duration_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(event.run_id.as_str())
        .bind(event.timestamp as i64)
        .bind(event.step_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(event.state.as_str())
        .bind(&event.persona)
        .bind(message)
        .bind(artifacts)
        .bind(event.tokens_used.map(|v| v as i64))
        .bind(event.duration_ms as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Events for a run, oldest first, optionally filtered.
    pub async fn list_events(
        &self,
        run_id: &RunId,
        step: Option<&StepId>,
        errors_only: bool,
        since_ms: Option<u64>,
    ) -> Result<Vec<ProgressEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT run_id, timestamp, step_id, state, persona, message, artifacts, \
             tokens_used, duration_ms \
             FROM event_log WHERE run_id = ?1 ORDER BY timestamp, id",
        )
        .bind(run_id.as_str())
        .fetch_all(&self.reader)
        .await?;

        let mut events = Vec::new();
        for row in &rows {
            let event = row_to_event(row)?;
            if let Some(step) = step {
                if event.step_id.as_ref() != Some(step) {
                    continue;
                }
            }
            if errors_only && !event.state.is_error() {
                continue;
            }
            if let Some(since) = since_ms {
                if event.timestamp < since {
                    continue;
                }
            }
            events.push(event);
        }
        Ok(events)
    }

    // --- Artifact operations ---

    /// Register an artifact. Idempotent on (run, step, name).
    pub async fn insert_artifact(&self, artifact: &ArtifactRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO artifact (run_id, step_id, name, path, type, size_bytes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(run_id, step_id, name) DO UPDATE SET \
             path = ?4, type = ?5, size_bytes = ?6",
        )
        .bind(artifact.run_id.as_str())
        .bind(artifact.step_id.as_str())
        .bind(&artifact.name)
        .bind(artifact.path.display().to_string())
        .bind(artifact.artifact_type.as_str())
        .bind(artifact.size_bytes as i64)
        .bind(artifact.created_at_ms as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Artifacts for a run, optionally scoped to one step.
    pub async fn list_artifacts(
        &self,
        run_id: &RunId,
        step: Option<&StepId>,
    ) -> Result<Vec<ArtifactRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT run_id, step_id, name, path, type, size_bytes, created_at \
             FROM artifact WHERE run_id = ?1 ORDER BY id",
        )
        .bind(run_id.as_str())
        .fetch_all(&self.reader)
        .await?;

        let mut artifacts = Vec::new();
        for row in &rows {
            let artifact = row_to_artifact(row)?;
            if let Some(step) = step {
                if &artifact.step_id != step {
                    continue;
                }
            }
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    // --- Cancellation ---

    /// Request cancellation. Idempotent; the earliest request wins, and
    /// a later force request upgrades the flag.
    pub async fn request_cancellation(
        &self,
        run_id: &RunId,
        force: bool,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO cancellation (run_id, requested_at, force) VALUES (?1, ?2, ?3) \
             ON CONFLICT(run_id) DO UPDATE SET force = MAX(force, ?3)",
        )
        .bind(run_id.as_str())
        .bind(now_ms as i64)
        .bind(force as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Pending cancellation for a run, if any: (requested_at_ms, force).
    pub async fn get_cancellation(
        &self,
        run_id: &RunId,
    ) -> Result<Option<(u64, bool)>, StorageError> {
        let row = sqlx::query("SELECT requested_at, force FROM cancellation WHERE run_id = ?1")
            .bind(run_id.as_str())
            .fetch_optional(&self.reader)
            .await?;
        Ok(row.map(|r| {
            let requested: i64 = r.get(0);
            let force: i64 = r.get(1);
            (requested as u64, force != 0)
        }))
    }

    // --- Metrics & progress ---

    pub async fn record_metric(&self, metric: &PerformanceMetric) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO performance_metric \
             (run_id, step_id, pipeline_name, persona, duration_ms, tokens_used, \
              files_modified, artifacts_generated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(metric.run_id.as_str())
        .bind(metric.step_id.as_str())
        .bind(&metric.pipeline_name)
        .bind(&metric.persona)
        .bind(metric.duration_ms as i64)
        .bind(metric.tokens_used as i64)
        .bind(metric.files_modified as i64)
        .bind(metric.artifacts_generated as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Upsert the live step-progress snapshot.
    pub async fn upsert_step_progress(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        state: StepState,
        message: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO step_progress (run_id, step_id, state, message, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(run_id, step_id) DO UPDATE SET state = ?3, message = ?4, updated_at = ?5",
        )
        .bind(run_id.as_str())
        .bind(step_id.as_str())
        .bind(state.as_str())
        .bind(message)
        .bind(now_ms as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Upsert the live pipeline-progress snapshot.
    pub async fn upsert_pipeline_progress(
        &self,
        run_id: &RunId,
        completed_steps: u64,
        total_steps: u64,
        current_step: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO pipeline_progress \
             (run_id, completed_steps, total_steps, current_step, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(run_id) DO UPDATE SET \
             completed_steps = ?2, total_steps = ?3, current_step = ?4, updated_at = ?5",
        )
        .bind(run_id.as_str())
        .bind(completed_steps as i64)
        .bind(total_steps as i64)
        .bind(current_step)
        .bind(now_ms as i64)
        .execute(&self.writer)
        .await?;
        Ok(())
    }

    /// Live pipeline progress: (completed, total, current_step).
    pub async fn get_pipeline_progress(
        &self,
        run_id: &RunId,
    ) -> Result<Option<(u64, u64, Option<String>)>, StorageError> {
        let row = sqlx::query(
            "SELECT completed_steps, total_steps, current_step FROM pipeline_progress \
             WHERE run_id = ?1",
        )
        .bind(run_id.as_str())
        .fetch_optional(&self.reader)
        .await?;
        Ok(row.map(|r| {
            let completed: i64 = r.get(0);
            let total: i64 = r.get(1);
            let current: Option<String> = r.get(2);
            (completed as u64, total as u64, current)
        }))
    }
}

// --- Row conversions ---

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<Run, StorageError> {
    let status_str: String = row.get("status");
    let status = RunStatus::parse(&status_str)
        .ok_or_else(|| StorageError::Corrupt(format!("bad run status {status_str:?}")))?;
    let input_str: String = row.get("input");
    let tags_str: String = row.get("tags_json");
    let tags: BTreeMap<String, String> = serde_json::from_str(&tags_str)?;

    let run_id: String = row.get("run_id");
    Ok(Run {
        id: RunId::new(run_id),
        pipeline_name: row.get("pipeline_name"),
        status,
        input: serde_json::from_str(&input_str)?,
        current_step: row.get("current_step"),
        total_tokens: row.get::<i64, _>("total_tokens") as u64,
        created_at_ms: row.get::<i64, _>("created_at") as u64,
        started_at_ms: row.get::<Option<i64>, _>("started_at").map(|v| v as u64),
        completed_at_ms: row.get::<Option<i64>, _>("completed_at").map(|v| v as u64),
        error: row.get("error_message"),
        tags,
    })
}

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<StepExecution, StorageError> {
    let state_str: String = row.get("state");
    let state = StepState::parse(&state_str)
        .ok_or_else(|| StorageError::Corrupt(format!("bad step state {state_str:?}")))?;

    let run_id: String = row.get("run_id");
    let step_id: String = row.get("step_id");
    Ok(StepExecution {
        run_id: RunId::new(run_id),
        step_id: StepId::new(step_id),
        state,
        retry_count: row.get::<i64, _>("retry_count") as u32,
        workspace_path: row
            .get::<Option<String>, _>("workspace_path")
            .map(PathBuf::from),
        started_at_ms: row.get::<Option<i64>, _>("started_at").map(|v| v as u64),
        completed_at_ms: row.get::<Option<i64>, _>("completed_at").map(|v| v as u64),
        tokens_used: row.get::<i64, _>("tokens_used") as u64,
        error: row.get("error_message"),
    })
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressEvent, StorageError> {
    let state_str: String = row.get("state");
    let state: EventState = serde_json::from_value(serde_json::Value::String(state_str.clone()))
        .map_err(|_| StorageError::Corrupt(format!("bad event state {state_str:?}")))?;
    let artifacts: Option<String> = row.get("artifacts");
    let artifacts = artifacts
        .map(|a| serde_json::from_str::<Vec<String>>(&a))
        .transpose()?;

    let run_id: String = row.get("run_id");
    Ok(ProgressEvent {
        timestamp: row.get::<i64, _>("timestamp") as u64,
        run_id: RunId::new(run_id),
        step_id: row.get::<Option<String>, _>("step_id").map(StepId::new),
        state,
        duration_ms: row.get::<i64, _>("duration_ms") as u64,
        message: row.get("message"),
        persona: row.get("persona"),
        artifacts,
        tokens_used: row.get::<Option<i64>, _>("tokens_used").map(|v| v as u64),
    })
}

fn row_to_artifact(row: &sqlx::sqlite::SqliteRow) -> Result<ArtifactRecord, StorageError> {
    let type_str: String = row.get("type");
    let artifact_type = ArtifactType::parse(&type_str)
        .ok_or_else(|| StorageError::Corrupt(format!("bad artifact type {type_str:?}")))?;

    let run_id: String = row.get("run_id");
    let step_id: String = row.get("step_id");
    let path: String = row.get("path");
    Ok(ArtifactRecord {
        run_id: RunId::new(run_id),
        step_id: StepId::new(step_id),
        name: row.get("name"),
        path: PathBuf::from(path),
        artifact_type,
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        created_at_ms: row.get::<i64, _>("created_at") as u64,
    })
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
