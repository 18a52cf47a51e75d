// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const FULL: &str = "# Refactor checkpoint\n\n## Summary\nExtracted the parser into its own crate.\nAll tests green.\n\n## Decisions\n- kept the old API surface\n- deferred the async rewrite\n\n_Generated at 2026-01-30T08:14:09Z_\n";

#[test]
fn full_document_parses() {
    let cp = parse_checkpoint(FULL).unwrap();
    assert_eq!(cp.title, "Refactor checkpoint");
    assert!(cp.summary.contains("parser into its own crate"));
    assert_eq!(cp.decisions.len(), 2);
    assert_eq!(cp.generated_at.as_deref(), Some("2026-01-30T08:14:09Z"));
}

#[test]
fn minimal_document_parses() {
    let cp = parse_checkpoint("# T\n\n## Summary\nwork happened\n").unwrap();
    assert_eq!(cp.title, "T");
    assert_eq!(cp.summary, "work happened");
    assert!(cp.decisions.is_empty());
    assert!(cp.generated_at.is_none());
}

#[parameterized(
    empty = { "", CheckpointError::Empty },
    whitespace = { "  \n\n ", CheckpointError::Empty },
    no_title = { "## Summary\nstuff\n", CheckpointError::MissingHeader },
    no_summary = { "# Title\n\n## Decisions\n- x\n", CheckpointError::EmptySummary },
    empty_summary = { "# Title\n\n## Summary\n\n", CheckpointError::EmptySummary },
)]
fn invalid_documents_are_rejected(text: &str, expected: CheckpointError) {
    assert_eq!(validate_checkpoint_format(text).unwrap_err(), expected);
}

#[test]
fn generate_then_validate_round_trips() {
    // Invariant: every successful compaction yields a document that
    // passes format validation.
    let doc = generate_checkpoint(
        "Checkpoint",
        "Implemented the retry loop.",
        &["fresh workspace per retry".to_string()],
        1_769_760_849_000,
    );
    validate_checkpoint_format(&doc).unwrap();

    let cp = parse_checkpoint(&doc).unwrap();
    assert_eq!(cp.title, "Checkpoint");
    assert_eq!(cp.summary, "Implemented the retry loop.");
    assert_eq!(cp.decisions, vec!["fresh workspace per retry"]);
    assert_eq!(cp.generated_at.as_deref(), Some("2026-01-30T08:14:09Z"));
}

#[test]
fn injection_prefix_carries_summary_and_decisions() {
    let cp = parse_checkpoint(FULL).unwrap();
    let prefix = inject_checkpoint_prompt(&cp);

    assert!(prefix.contains("Resume from this checkpoint"));
    assert!(prefix.contains("Extracted the parser"));
    assert!(prefix.contains("do not revisit"));
    assert!(prefix.contains("- kept the old API surface"));
    // A prefix: must end cleanly so the step prompt follows on
    assert!(prefix.ends_with('\n'));
}
