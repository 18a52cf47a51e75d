// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations.

pub mod artifacts;
pub mod cancel;
pub mod clean;
pub mod list;
pub mod logs;
pub mod resume;
pub mod run;
pub mod status;
pub mod validate;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use wave_adapters::HeadlessRunner;
use wave_core::SystemClock;
use wave_engine::{Runtime, RuntimeConfig};
use wave_manifest::Manifest;

/// Global flags shared by every command.
pub struct Context {
    pub manifest_path: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
}

impl Context {
    /// Project root is the current directory (after `-C`).
    pub fn project_root(&self) -> Result<PathBuf> {
        std::env::current_dir().context("cannot determine project root")
    }

    /// Load the manifest (`wave.yaml` by default).
    pub fn load_manifest(&self) -> Result<Manifest> {
        let root = self.project_root()?;
        let path = self
            .manifest_path
            .clone()
            .unwrap_or_else(|| root.join("wave.yaml"));
        let manifest = wave_manifest::load_manifest(&path)?;
        Ok(manifest)
    }

    /// Open the production runtime.
    pub async fn runtime(&self) -> Result<Runtime<HeadlessRunner, SystemClock>> {
        let project_root = self.project_root()?;
        let mut config = RuntimeConfig::for_project(&project_root);
        if let Some(data_root) = &self.data_root {
            config.data_root = data_root.clone();
        }
        let manifest = self.load_manifest()?;
        let runtime = Runtime::open(manifest, HeadlessRunner::new(), SystemClock, config).await?;
        Ok(runtime)
    }

    /// Load a pipeline file against the manifest.
    pub fn load_pipeline(&self, path: &Path) -> Result<wave_manifest::PipelineSpec> {
        let manifest = self.load_manifest()?;
        let pipeline = wave_manifest::load_pipeline(path, &manifest)?;
        Ok(pipeline)
    }
}

/// Parse repeated `--tag k=v` flags.
pub fn parse_tags(raw: &[String]) -> Result<std::collections::BTreeMap<String, String>> {
    let mut tags = std::collections::BTreeMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("tag {entry:?} is not of the form key=value"))?;
        tags.insert(key.to_string(), value.to_string());
    }
    Ok(tags)
}

/// Parse the `--input` flag: inline JSON when it parses, raw text otherwise.
pub fn parse_input(raw: Option<&str>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Object(Default::default()),
        Some(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
