// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared reconciler utilities (C14): condition conversion between the pure
//! `arena-core` types and the `JsonSchema`-derived wire types in
//! `arena-crds`, workspace-label resolution, event emission, and the
//! optimistic-concurrency backoff helper every reconciler funnels errors
//! through.

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Api, Client, Resource};

use crate::error::ReconcileError;

pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(2);

pub fn to_wire_condition(condition: &arena_core::Condition) -> arena_crds::Condition {
    arena_crds::Condition {
        type_: condition.type_.clone(),
        status: match condition.status {
            arena_core::ConditionStatus::True => arena_crds::ConditionStatus::True,
            arena_core::ConditionStatus::False => arena_crds::ConditionStatus::False,
            arena_core::ConditionStatus::Unknown => arena_crds::ConditionStatus::Unknown,
        },
        reason: condition.reason.clone(),
        message: condition.message.clone(),
        observed_generation: condition.observed_generation,
        last_transition_time: condition.last_transition_time,
    }
}

pub fn from_wire_condition(condition: &arena_crds::Condition) -> arena_core::Condition {
    arena_core::Condition {
        type_: condition.type_.clone(),
        status: match condition.status {
            arena_crds::ConditionStatus::True => arena_core::ConditionStatus::True,
            arena_crds::ConditionStatus::False => arena_core::ConditionStatus::False,
            arena_crds::ConditionStatus::Unknown => arena_core::ConditionStatus::Unknown,
        },
        reason: condition.reason.clone(),
        message: condition.message.clone(),
        observed_generation: condition.observed_generation,
        last_transition_time: condition.last_transition_time,
    }
}

/// Sets `next` into `conditions` (wire representation) using the pure
/// core merge rule, round-tripping through `arena_core::Condition`.
pub fn set_condition(conditions: &mut Vec<arena_crds::Condition>, next: arena_crds::Condition) {
    let mut pure: Vec<arena_core::Condition> = conditions.iter().map(from_wire_condition).collect();
    arena_core::set_condition(&mut pure, from_wire_condition(&next));
    *conditions = pure.iter().map(to_wire_condition).collect();
}

/// Resolves a namespace's effective workspace name by reading its
/// `workspace` label. `None` client short-circuits to the namespace name,
/// matching `arena_core::resolve_workspace`'s pure fallback.
pub async fn resolve_workspace(client: Option<&Client>, namespace: &str) -> String {
    let Some(client) = client else {
        return arena_core::resolve_workspace(namespace, None);
    };
    let api: Api<Namespace> = Api::all(client.clone());
    let label = match api.get(namespace).await {
        Ok(ns) => ns.metadata.labels.and_then(|labels| labels.get("workspace").cloned()),
        Err(_) => None,
    };
    arena_core::resolve_workspace(namespace, label.as_deref())
}

/// Wraps the `(Client, Reporter)` pair needed to build a [`Recorder`] bound
/// to the specific resource being reconciled. A `Recorder` is scoped to one
/// `ObjectReference` at construction, so each reconcile call binds a fresh
/// one via [`EventRecorder::for_resource`] instead of sharing a single
/// `Recorder` across every resource a controller reconciles.
#[derive(Clone)]
pub struct EventRecorder(Option<(Client, Reporter)>);

impl EventRecorder {
    pub fn new(client: Option<Client>, reporter: Reporter) -> Self {
        Self(client.map(|c| (c, reporter)))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    /// Binds this recorder to `resource`'s `ObjectReference` for the
    /// duration of one reconcile call.
    pub fn for_resource<K>(&self, resource: &K) -> ScopedEventRecorder
    where
        K: Resource<DynamicType = ()>,
    {
        ScopedEventRecorder(self.0.as_ref().map(|(client, reporter)| Recorder::new(client.clone(), reporter.clone(), resource.object_ref(&()))))
    }
}

#[derive(Clone)]
pub struct ScopedEventRecorder(Option<Recorder>);

impl ScopedEventRecorder {
    pub async fn emit(&self, type_: EventType, reason: &str, note: impl Into<String>, action: &str) {
        let Some(recorder) = &self.0 else { return };
        let _ = recorder
            .publish(&Event { type_, reason: reason.into(), note: Some(note.into()), action: action.into(), secondary: None })
            .await;
    }
}

/// Maps an HTTP 409 Conflict from a status/spec update into a short requeue
/// instead of surfacing the error to the controller's error handler.
pub fn conflict_to_requeue(error: kube::Error) -> Result<Action, ReconcileError> {
    if let kube::Error::Api(api_error) = &error {
        if api_error.code == 409 {
            return Ok(Action::requeue(CONFLICT_REQUEUE));
        }
    }
    Err(ReconcileError::Kube(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn wire_cond(status: arena_crds::ConditionStatus) -> arena_crds::Condition {
        arena_crds::Condition {
            type_: "Ready".into(),
            status,
            reason: "R".into(),
            message: "m".into(),
            observed_generation: 1,
            last_transition_time: Utc::now(),
        }
    }

    #[test]
    fn round_trip_preserves_fields() {
        let wire = wire_cond(arena_crds::ConditionStatus::True);
        let pure = from_wire_condition(&wire);
        let back = to_wire_condition(&pure);
        assert_eq!(wire.type_, back.type_);
        assert_eq!(back.status, arena_crds::ConditionStatus::True);
    }

    #[test]
    fn set_condition_merges_by_type() {
        let mut conditions = vec![wire_cond(arena_crds::ConditionStatus::False)];
        set_condition(&mut conditions, wire_cond(arena_crds::ConditionStatus::True));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, arena_crds::ConditionStatus::True);
    }

    #[tokio::test]
    async fn resolve_workspace_with_no_client_falls_back_to_namespace() {
        assert_eq!(resolve_workspace(None, "team-a").await, "team-a");
    }
}
