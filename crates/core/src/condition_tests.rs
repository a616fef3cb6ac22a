// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn cond(status: ConditionStatus, reason: &str, gen: i64, time: i64) -> Condition {
    Condition {
        type_: "Ready".into(),
        status,
        reason: reason.into(),
        message: "".into(),
        observed_generation: gen,
        last_transition_time: at(time),
    }
}

#[test]
fn inserts_new_condition_type() {
    let mut conditions = Vec::new();
    set_condition(&mut conditions, cond(ConditionStatus::True, "Synced", 1, 100));
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].reason, "Synced");
}

#[test]
fn same_status_keeps_prior_transition_time() {
    let mut conditions = vec![cond(ConditionStatus::True, "Synced", 1, 100)];
    set_condition(&mut conditions, cond(ConditionStatus::True, "StillSynced", 2, 200));
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].reason, "StillSynced");
    assert_eq!(conditions[0].observed_generation, 2);
    assert_eq!(conditions[0].last_transition_time, at(100));
}

#[test]
fn status_change_advances_transition_time() {
    let mut conditions = vec![cond(ConditionStatus::True, "Synced", 1, 100)];
    set_condition(&mut conditions, cond(ConditionStatus::False, "FetchFailed", 2, 200));
    assert_eq!(conditions[0].status, ConditionStatus::False);
    assert_eq!(conditions[0].last_transition_time, at(200));
}

#[test]
fn distinct_types_do_not_collide() {
    let mut conditions = Vec::new();
    set_condition(&mut conditions, cond(ConditionStatus::True, "Synced", 1, 100));
    let mut ready = cond(ConditionStatus::True, "Ready", 1, 100);
    ready.type_ = "SourceValid".into();
    set_condition(&mut conditions, ready);
    assert_eq!(conditions.len(), 2);
}

#[test]
fn serde_round_trip_uses_pascal_case_status() {
    let c = cond(ConditionStatus::Unknown, "Pending", 0, 0);
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["status"], "Unknown");
    assert_eq!(json["type"], "Ready");
    let back: Condition = serde_json::from_value(json).unwrap();
    assert_eq!(back, c);
}
