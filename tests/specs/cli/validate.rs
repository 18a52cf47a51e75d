//! `wave validate` specs: offline validation and exit code 2.

use crate::prelude::*;

#[test]
fn valid_pipeline_passes_with_order() {
    let project = Project::minimal();
    let assert = project
        .wave()
        .args(["validate", "pipelines/hello.yaml"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("hello: ok"));
    assert!(output.contains("order: a"));
}

#[test]
fn cycle_exits_with_validation_code() {
    let project = Project::minimal();
    project.file(
        "pipelines/cycle.yaml",
        r#"
kind: Pipeline
metadata: { name: cyclic }
steps:
  - id: a
    persona: builder
    dependencies: [b]
    exec: { type: prompt, source: "x" }
  - id: b
    persona: builder
    dependencies: [a]
    exec: { type: prompt, source: "x" }
"#,
    );

    let assert = project
        .wave()
        .args(["validate", "pipelines/cycle.yaml"])
        .assert()
        .code(2);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    // Both steps on the cycle are named.
    assert!(stderr.contains('a') && stderr.contains('b'), "{stderr}");
    assert!(stderr.contains("cycle"), "{stderr}");
}

#[test]
fn empty_pipeline_is_a_validation_failure() {
    let project = Project::minimal();
    project.file(
        "pipelines/empty.yaml",
        "kind: Pipeline\nmetadata: { name: empty }\nsteps: []\n",
    );

    let assert = project
        .wave()
        .args(["validate", "pipelines/empty.yaml"])
        .assert()
        .code(2);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("no steps"), "{stderr}");
}

#[test]
fn unknown_persona_is_a_validation_failure() {
    let project = Project::minimal();
    project.file(
        "pipelines/ghost.yaml",
        r#"
kind: Pipeline
metadata: { name: ghostly }
steps:
  - id: a
    persona: ghost
    exec: { type: prompt, source: "x" }
"#,
    );

    project
        .wave()
        .args(["validate", "pipelines/ghost.yaml"])
        .assert()
        .code(2);
}

#[test]
fn missing_manifest_is_a_validation_failure() {
    let project = Project::empty();
    project.file("pipelines/hello.yaml", MINIMAL_PIPELINE);

    project
        .wave()
        .args(["validate", "pipelines/hello.yaml"])
        .assert()
        .code(2);
}
