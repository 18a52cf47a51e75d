//! CLI help and version specs

use crate::prelude::*;

#[test]
fn help_lists_core_operations() {
    let project = Project::empty();
    let assert = project.wave().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    for verb in [
        "run", "resume", "status", "list", "logs", "cancel", "artifacts", "clean", "validate",
    ] {
        assert!(output.contains(verb), "help is missing {verb:?}:\n{output}");
    }
}

#[test]
fn version_prints_and_exits_zero() {
    let project = Project::empty();
    project.wave().arg("--version").assert().success();
}

#[test]
fn no_subcommand_is_an_error() {
    let project = Project::empty();
    project.wave().assert().failure();
}
