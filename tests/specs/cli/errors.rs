//! CLI error handling specs
//!
//! Verify error messages and exit codes for bad invocations.

use crate::prelude::*;

#[test]
fn status_of_unknown_run_fails_with_message() {
    let project = Project::minimal();
    let assert = project
        .wave()
        .args(["status", "no-such-run"])
        .assert()
        .code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("no-such-run"), "{stderr}");
}

#[test]
fn logs_of_unknown_run_fails() {
    let project = Project::minimal();
    project
        .wave()
        .args(["logs", "no-such-run"])
        .assert()
        .code(1);
}

#[test]
fn run_with_missing_pipeline_file_fails_validation() {
    let project = Project::minimal();
    project
        .wave()
        .args(["run", "pipelines/missing.yaml"])
        .assert()
        .code(2);
}

#[test]
fn malformed_tag_is_rejected() {
    let project = Project::minimal();
    let assert = project
        .wave()
        .args(["run", "pipelines/hello.yaml", "--tag", "notakv"])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("notakv"), "{stderr}");
}
