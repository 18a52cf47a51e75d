// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact records.
//!
//! An artifact is a file or directory produced by a step. The producing
//! step's workspace owns the bytes; consumers always receive copies.

use crate::id::{RunId, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Type tag declared on an output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Json,
    Markdown,
    Source,
    Directory,
    #[default]
    File,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Json => "json",
            ArtifactType::Markdown => "markdown",
            ArtifactType::Source => "source",
            ArtifactType::Directory => "directory",
            ArtifactType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<ArtifactType> {
        match s {
            "json" => Some(ArtifactType::Json),
            "markdown" => Some(ArtifactType::Markdown),
            "source" => Some(ArtifactType::Source),
            "directory" => Some(ArtifactType::Directory),
            "file" => Some(ArtifactType::File),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered artifact produced by a completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub run_id: RunId,
    pub step_id: StepId,
    /// Logical name unique within the producing step.
    pub name: String,
    /// Absolute path inside the producing step's workspace.
    pub path: PathBuf,
    pub artifact_type: ArtifactType,
    pub size_bytes: u64,
    pub created_at_ms: u64,
}
