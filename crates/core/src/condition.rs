// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status condition merging (C14).
//!
//! [`set_condition`] is the one place every reconciler touches `status.conditions`.
//! It is a pure function over `Vec<Condition>` so it can be unit tested without a
//! cluster; the reconcilers only handle serializing the result back into a CRD's
//! status subresource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub observed_generation: i64,
    pub last_transition_time: DateTime<Utc>,
}

/// Merges `next` into `conditions`, keyed by `type_`.
///
/// `last_transition_time` only advances when `status` actually changes; an
/// unchanged status keeps the prior transition time even if reason/message/
/// observedGeneration are refreshed.
pub fn set_condition(conditions: &mut Vec<Condition>, next: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == next.type_) {
        Some(existing) => {
            let transition_time = if existing.status == next.status {
                existing.last_transition_time
            } else {
                next.last_transition_time
            };
            *existing = Condition { last_transition_time: transition_time, ..next };
        }
        None => conditions.push(next),
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
