//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Minimal manifest declaring one adapter and one persona.
pub const MINIMAL_MANIFEST: &str = r#"
metadata:
  name: spec-project
adapters:
  claude:
    binary: claude
personas:
  builder:
    adapter: claude
    system_prompt_file: personas/builder.md
"#;

/// Single-step pipeline referencing the builder persona.
pub const MINIMAL_PIPELINE: &str = r#"
kind: Pipeline
metadata:
  name: hello
steps:
  - id: a
    persona: builder
    exec:
      type: prompt
      source: "do {input}"
"#;

/// A scratch project directory with manifest and pipeline fixtures.
pub struct Project {
    root: TempDir,
    data: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    /// A project with the minimal manifest, persona prompt, and pipeline.
    pub fn minimal() -> Self {
        let project = Self::empty();
        project.file("wave.yaml", MINIMAL_MANIFEST);
        project.file("personas/builder.md", "You are the builder.\n");
        project.file("pipelines/hello.yaml", MINIMAL_PIPELINE);
        project
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write a file under the project root, creating parents.
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// A wave command rooted in this project with an isolated data root.
    pub fn wave(&self) -> Command {
        let mut cmd = Command::cargo_bin("wave").unwrap();
        cmd.current_dir(self.root.path())
            .arg("--data-root")
            .arg(self.data.path());
        cmd
    }
}
