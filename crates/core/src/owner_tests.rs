// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn owner(uid: &str) -> OwnerRef {
    OwnerRef::new("arena.io/v1", "ArenaJob", "job-a", uid)
}

#[test]
fn verify_accepts_matching_uid() {
    let expected = owner("uid-1");
    let found = owner("uid-1");
    assert!(expected.verify(Some(&found)).is_ok());
}

#[test]
fn verify_rejects_mismatched_uid() {
    let expected = owner("uid-1");
    let found = owner("uid-2");
    let err = expected.verify(Some(&found)).unwrap_err();
    assert_eq!(err.expected, expected);
    assert_eq!(err.found, Some(found));
}

#[test]
fn verify_rejects_missing_owner() {
    let expected = owner("uid-1");
    let err = expected.verify(None).unwrap_err();
    assert_eq!(err.found, None);
}

#[test]
fn verify_ignores_name_and_kind_differences() {
    let expected = OwnerRef::new("arena.io/v1", "ArenaJob", "job-a", "uid-1");
    let renamed = OwnerRef::new("arena.io/v1", "ArenaJob", "job-b", "uid-1");
    assert!(expected.verify(Some(&renamed)).is_ok());
}
