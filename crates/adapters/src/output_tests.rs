// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const STREAM: &str = r#"
{"type":"system","subtype":"init","session_id":"abc"}
{"type":"assistant","message":{"usage":{"input_tokens":100,"output_tokens":40}}}
not json diagnostics line
{"type":"assistant","message":{"usage":{"input_tokens":50,"output_tokens":25,"cache_read_input_tokens":10}}}
{"type":"result","subtype":"success","result":"done: wrote out.json","is_error":false,"usage":{"input_tokens":150,"output_tokens":65,"cache_read_input_tokens":10}}
"#;

#[test]
fn full_stream_parses_with_aggregate_usage() {
    let parsed = parse_stream(STREAM).unwrap();
    assert_eq!(parsed.result_text, "done: wrote out.json");
    assert!(!parsed.is_error);
    // Aggregate usage from the result record wins over the running sum
    assert_eq!(parsed.usage.input_tokens, 150);
    assert_eq!(parsed.usage.output_tokens, 65);
    assert_eq!(parsed.usage.cache_read_input_tokens, 10);
    assert_eq!(parsed.records, 4);
}

#[test]
fn result_without_aggregate_usage_falls_back_to_sum() {
    let stream = r#"
{"type":"assistant","message":{"usage":{"input_tokens":10,"output_tokens":5}}}
{"type":"assistant","message":{"usage":{"input_tokens":20,"output_tokens":5}}}
{"type":"result","result":"ok"}
"#;
    let parsed = parse_stream(stream).unwrap();
    assert_eq!(parsed.usage.input_tokens, 30);
    assert_eq!(parsed.usage.output_tokens, 10);
}

#[test]
fn error_result_is_flagged() {
    let stream = r#"{"type":"result","subtype":"error","result":"limit reached"}"#;
    let parsed = parse_stream(stream).unwrap();
    assert!(parsed.is_error);
}

#[test]
fn missing_result_record_is_a_parse_error() {
    let stream = r#"{"type":"assistant","message":{"usage":{"output_tokens":5}}}"#;
    let err = parse_stream(stream).unwrap_err();
    assert!(matches!(err, AdapterError::OutputParse(_)));
    assert!(err.to_string().contains("result record"));
}

#[test]
fn fully_unparseable_output_is_a_parse_error() {
    let err = parse_stream("plain text\nmore text\n").unwrap_err();
    assert!(matches!(err, AdapterError::OutputParse(_)));
}

#[test]
fn incremental_parser_reports_cumulative_tokens() {
    let mut parser = StreamParser::new();
    assert_eq!(parser.cumulative_tokens(), 0);

    parser.push_line(r#"{"type":"assistant","message":{"usage":{"input_tokens":100,"output_tokens":40}}}"#);
    assert_eq!(parser.cumulative_tokens(), 140);

    parser.push_line(r#"{"type":"assistant","message":{"usage":{"output_tokens":60}}}"#);
    assert_eq!(parser.cumulative_tokens(), 200);
}
