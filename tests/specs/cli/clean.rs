//! `wave clean` specs: selection reporting and dry-run parity.

use crate::prelude::*;

#[test]
fn clean_with_no_criteria_removes_nothing() {
    let project = Project::minimal();
    let assert = project.wave().arg("clean").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("removed 0 run(s)"), "{output}");
}

#[test]
fn clean_dry_run_reports_without_removing() {
    let project = Project::minimal();
    let assert = project
        .wave()
        .args(["clean", "--all", "--dry-run"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("would remove"), "{output}");
}

#[test]
fn list_on_a_fresh_store_shows_only_headers() {
    let project = Project::minimal();
    let assert = project.wave().arg("list").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.starts_with("RUN"));
    assert_eq!(output.lines().count(), 1, "{output}");
}
