// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;
use yare::parameterized;

#[test]
fn short_id_truncates_long_strings() {
    assert_eq!("abcdefgh".short(4), "abcd");
    assert_eq!("abc".short(8), "abc");
}

#[test]
fn run_id_macro_impls() {
    let id = RunId::new("hello-20260130-081409-a1b2c3");
    assert_eq!(id.as_str(), "hello-20260130-081409-a1b2c3");
    assert_eq!(id, "hello-20260130-081409-a1b2c3");
    assert_eq!(format!("{}", id), "hello-20260130-081409-a1b2c3");
    assert_eq!(id.short(5), "hello");
}

#[test]
fn generated_run_id_has_expected_shape() {
    // 2026-01-30T08:14:09Z
    let epoch_ms = 1_769_760_849_000;
    let id = generate_run_id("hello", epoch_ms);
    let s = id.as_str();
    assert!(s.starts_with("hello-20260130-081409-"), "got {s}");

    let suffix = s.rsplit('-').next().unwrap();
    assert_eq!(suffix.len(), 6);
    assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn generated_run_ids_are_unique_per_invocation() {
    let epoch_ms = 1_769_760_849_000;
    let ids: HashSet<String> = (0..50)
        .map(|_| generate_run_id("p", epoch_ms).0)
        .collect();
    // Collisions over 36^6 suffixes in 50 draws would indicate a broken RNG.
    assert!(ids.len() > 45);
}

#[test]
fn matrix_worker_id_derivation() {
    let parent = StepId::new("review");
    assert_eq!(parent.matrix_worker(0), "review[0]");
    assert_eq!(parent.matrix_worker(12), "review[12]");
}

#[parameterized(
    zero = { 0 },
    small = { 3 },
)]
fn sequential_idgen_is_monotone(skip: usize) {
    let idgen = SequentialIdGen::new("t");
    for _ in 0..skip {
        idgen.next();
    }
    let a = idgen.next();
    let b = idgen.next();
    assert_ne!(a, b);
    assert_eq!(a, format!("t-{}", skip + 1));
}

#[test]
fn uuid_idgen_produces_distinct_ids() {
    let idgen = UuidIdGen;
    assert_ne!(idgen.next(), idgen.next());
}
