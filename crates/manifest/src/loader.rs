// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML loading for manifest and pipeline files.

use crate::manifest::Manifest;
use crate::pipeline::PipelineSpec;
use crate::validate::{validate_manifest, validate_pipeline};
use crate::ManifestError;
use std::path::Path;

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let manifest: Manifest =
        serde_yaml::from_str(&text).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    validate_manifest(&manifest)?;
    tracing::debug!(
        path = %path.display(),
        adapters = manifest.adapters.len(),
        personas = manifest.personas.len(),
        "loaded manifest"
    );
    Ok(manifest)
}

/// Load a pipeline file and validate it against the manifest.
pub fn load_pipeline(path: &Path, manifest: &Manifest) -> Result<PipelineSpec, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let pipeline: PipelineSpec =
        serde_yaml::from_str(&text).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    validate_pipeline(&pipeline, manifest)?;
    tracing::debug!(
        path = %path.display(),
        pipeline = pipeline.name(),
        steps = pipeline.steps.len(),
        "loaded pipeline"
    );
    Ok(pipeline)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
