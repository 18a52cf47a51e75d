// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tags_parse_key_value_pairs() {
    let tags = parse_tags(&["team=infra".to_string(), "env=ci".to_string()]).unwrap();
    assert_eq!(tags["team"], "infra");
    assert_eq!(tags["env"], "ci");
}

#[test]
fn malformed_tag_is_rejected() {
    let err = parse_tags(&["oops".to_string()]).unwrap_err();
    assert!(err.to_string().contains("oops"));
}

#[test]
fn input_parses_json_when_it_is_json() {
    let value = parse_input(Some(r#"{"issue": 42}"#));
    assert_eq!(value["issue"], 42);
}

#[test]
fn input_falls_back_to_plain_text() {
    let value = parse_input(Some("fix the flaky test"));
    assert_eq!(value, serde_json::Value::String("fix the flaky test".to_string()));
}

#[test]
fn missing_input_is_an_empty_object() {
    let value = parse_input(None);
    assert!(value.as_object().unwrap().is_empty());
}
