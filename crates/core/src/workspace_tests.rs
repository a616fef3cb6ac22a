// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uses_label_when_present() {
    assert_eq!(resolve_workspace("team-a", Some("shared-workspace")), "shared-workspace");
}

#[test]
fn falls_back_to_namespace_when_label_missing() {
    assert_eq!(resolve_workspace("team-a", None), "team-a");
}

#[test]
fn falls_back_to_namespace_when_label_empty() {
    assert_eq!(resolve_workspace("team-a", Some("")), "team-a");
}
