// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

#[test]
fn unchanged_has_empty_content_path() {
    let artifact = Artifact::unchanged("rev-1", "abc123abc123", now());
    assert!(artifact.is_unchanged());
    assert_eq!(artifact.revision, "rev-1");
    assert_eq!(artifact.version, "abc123abc123");
}

#[test]
fn fetched_artifact_is_not_unchanged() {
    let artifact = Artifact {
        revision: "rev-2".into(),
        content_path: ".arena/versions/abc123abc123".into(),
        version: "abc123abc123".into(),
        checksum: "abc123abc123deadbeef".into(),
        size: 4096,
        last_update_time: now(),
    };
    assert!(!artifact.is_unchanged());
}

#[test]
fn serde_round_trip() {
    let artifact = Artifact {
        revision: "rev-3".into(),
        content_path: ".arena/versions/deadbeefcafe".into(),
        version: "deadbeefcafe".into(),
        checksum: "deadbeefcafe0000111122223333".into(),
        size: 128,
        last_update_time: now(),
    };
    let json = serde_json::to_string(&artifact).unwrap();
    let back: Artifact = serde_json::from_str(&json).unwrap();
    assert_eq!(artifact, back);
}
