// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn base_whitelist_is_forwarded() {
    std::env::set_var("PATH", "/usr/bin:/bin");
    let env = curated_env(&[], &[]);
    assert!(env.iter().any(|(k, v)| k == "PATH" && v.contains("/usr/bin")));
}

#[test]
#[serial]
fn full_host_environment_is_not_inherited() {
    std::env::set_var("WAVE_TEST_SECRET_TOKEN", "sk-do-not-leak");
    let env = curated_env(&[], &[]);
    assert!(!env.iter().any(|(k, _)| k == "WAVE_TEST_SECRET_TOKEN"));
    std::env::remove_var("WAVE_TEST_SECRET_TOKEN");
}

#[test]
#[serial]
fn passthrough_names_are_forwarded() {
    std::env::set_var("WAVE_TEST_CARGO_HOME", "/opt/cargo");
    let env = curated_env(&["WAVE_TEST_CARGO_HOME".to_string()], &[]);
    assert!(env
        .iter()
        .any(|(k, v)| k == "WAVE_TEST_CARGO_HOME" && v == "/opt/cargo"));
    std::env::remove_var("WAVE_TEST_CARGO_HOME");
}

#[test]
#[serial]
fn unset_passthrough_is_skipped() {
    std::env::remove_var("WAVE_TEST_UNSET");
    let env = curated_env(&["WAVE_TEST_UNSET".to_string()], &[]);
    assert!(!env.iter().any(|(k, _)| k == "WAVE_TEST_UNSET"));
}

#[test]
#[serial]
fn extra_pairs_override_whitelist() {
    std::env::set_var("HOME", "/home/host");
    let env = curated_env(&[], &[("HOME".to_string(), "/ws/fake-home".to_string())]);
    let home: Vec<&(String, String)> = env.iter().filter(|(k, _)| k == "HOME").collect();
    assert_eq!(home.len(), 1);
    assert_eq!(home[0].1, "/ws/fake-home");
}
