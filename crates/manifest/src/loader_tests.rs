// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

const MANIFEST: &str = r#"
metadata: { name: proj }
adapters:
  claude: { binary: claude }
personas:
  builder:
    adapter: claude
    system_prompt_file: personas/builder.md
"#;

const PIPELINE: &str = r#"
kind: Pipeline
metadata: { name: hello }
steps:
  - id: a
    persona: builder
    exec: { type: prompt, source: "do {input}" }
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn manifest_and_pipeline_load_together() {
    let dir = TempDir::new().unwrap();
    let manifest_path = write(&dir, "wave.yaml", MANIFEST);
    let pipeline_path = write(&dir, "hello.yaml", PIPELINE);

    let manifest = load_manifest(&manifest_path).unwrap();
    let pipeline = load_pipeline(&pipeline_path, &manifest).unwrap();
    assert_eq!(pipeline.name(), "hello");
}

#[test]
fn missing_file_reports_path() {
    let err = load_manifest(&PathBuf::from("/nonexistent/wave.yaml")).unwrap_err();
    match err {
        ManifestError::Read { path, .. } => assert!(path.contains("nonexistent")),
        other => panic!("expected read error, got {other}"),
    }
}

#[test]
fn malformed_yaml_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bad.yaml", "kind: [unterminated");
    let manifest: Manifest = serde_yaml::from_str(MANIFEST).unwrap();
    let err = load_pipeline(&path, &manifest).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }));
}

#[test]
fn pipeline_referencing_unknown_persona_fails_validation() {
    let dir = TempDir::new().unwrap();
    let manifest_path = write(&dir, "wave.yaml", MANIFEST);
    let pipeline_path = write(
        &dir,
        "bad.yaml",
        r#"
kind: Pipeline
metadata: { name: broken }
steps:
  - id: a
    persona: ghost
    exec: { type: prompt, source: "x" }
"#,
    );

    let manifest = load_manifest(&manifest_path).unwrap();
    let err = load_pipeline(&pipeline_path, &manifest).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}
