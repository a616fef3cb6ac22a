// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effective-policy publisher (C10): resolves a `SessionPrivacyPolicy`'s
//! parent chain, folds it with the pure merge in `arena-core` (C9), and
//! publishes the result as a `core/v1 ConfigMap` for consumers that can't
//! watch CRDs directly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};

use arena_core::policy::{self as core_policy, PrivacyPolicySpec};
use arena_crds::policy::{PolicyLevel, PolicyStatusPhase, SessionPrivacyPolicy, SessionPrivacyPolicySpec, SessionPrivacyPolicyStatus};
use arena_crds::{Condition, ConditionStatus};

use crate::error::{ReconcileError, Result};
use crate::util;

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY_VALUE: &str = "arena-operator";
const LEVEL_LABEL: &str = "arena.dev/policy-level";
const TOUCHED_BY_ANNOTATION: &str = "arena.dev/touched-by-generation";

pub struct PolicyContext {
    pub client: Client,
    pub shared_namespace: String,
    pub events: util::EventRecorder,
}

pub async fn reconcile_policy(policy: Arc<SessionPrivacyPolicy>, ctx: Arc<PolicyContext>) -> Result<Action> {
    let Some(namespace) = policy.namespace() else {
        return Err(ReconcileError::MissingNamespace { kind: "SessionPrivacyPolicy", namespace: String::new(), name: policy.name_any() });
    };
    let api: Api<SessionPrivacyPolicy> = Api::namespaced(ctx.client.clone(), &namespace);
    let events = ctx.events.for_resource(&*policy);
    let all: Api<SessionPrivacyPolicy> = Api::all(ctx.client.clone());
    let universe = all.list(&Default::default()).await?.items;

    let mut status = policy.status.clone().unwrap_or_default();
    status.observed_generation = policy.meta().generation.unwrap_or_default();

    let Some((chain, parent_name)) = resolve_chain(&policy, &namespace, &universe) else {
        util::set_condition(&mut status.conditions, not_ready("ParentFound", "no parent policy found for a non-global level"));
        status.phase = Some(PolicyStatusPhase::Error);
        patch_status(&api, &policy, status.clone()).await?;
        events.emit(EventType::Warning, "ParentNotFound", "could not resolve parent policy", "Reconcile").await;
        return Ok(Action::await_change());
    };
    util::set_condition(&mut status.conditions, ready("ParentFound", "parent policy resolved"));
    status.parent_policy = parent_name.clone();

    let core_chain: Vec<PrivacyPolicySpec> = chain.iter().map(to_core_spec).collect();
    let Some(effective) = core_policy::merge_chain(&core_chain) else {
        util::set_condition(&mut status.conditions, not_ready("EffectivePolicyStored", "empty merge chain"));
        status.phase = Some(PolicyStatusPhase::Error);
        patch_status(&api, &policy, status.clone()).await?;
        return Ok(Action::await_change());
    };

    publish_effective_policy(&ctx.client, &ctx.shared_namespace, &policy.name_any(), &policy.spec.level, &effective, parent_name.as_deref()).await?;
    util::set_condition(&mut status.conditions, ready("EffectivePolicyStored", "effective policy published"));
    util::set_condition(&mut status.conditions, ready("Ready", "policy active"));
    status.phase = Some(PolicyStatusPhase::Active);
    patch_status(&api, &policy, status.clone()).await?;
    events.emit(EventType::Normal, "PolicyPublished", "effective policy published", "Reconcile").await;

    touch_children(&ctx.client, &policy, &universe).await?;

    Ok(Action::requeue(Duration::from_secs(300)))
}

pub fn on_error_policy(policy: Arc<SessionPrivacyPolicy>, error: &ReconcileError, _ctx: Arc<PolicyContext>) -> Action {
    tracing::error!(name = %policy.name_any(), namespace = ?policy.namespace(), error = %error, "SessionPrivacyPolicy reconcile failed");
    Action::requeue(Duration::from_secs(15))
}

/// Resolves `[root, .., self]` per 4.9's level rules. Returns `None` when a
/// non-global level has no resolvable parent at all.
fn resolve_chain(policy: &SessionPrivacyPolicy, namespace: &str, universe: &[SessionPrivacyPolicy]) -> Option<(Vec<SessionPrivacyPolicySpec>, Option<String>)> {
    match policy.spec.level {
        PolicyLevel::Global => Some((vec![policy.spec.clone()], None)),
        PolicyLevel::Workspace => {
            let global = find_global(universe);
            match global {
                Some(g) => Some((vec![g.spec.clone(), policy.spec.clone()], Some(g.name_any()))),
                None => None,
            }
        }
        PolicyLevel::Agent => {
            let global = find_global(universe);
            let workspace = find_workspace_for_namespace(universe, namespace);
            if global.is_none() && workspace.is_none() {
                return None;
            }
            let mut chain = Vec::new();
            let mut parent_name = None;
            if let Some(g) = &global {
                chain.push(g.spec.clone());
                parent_name = Some(g.name_any());
            }
            if let Some(w) = &workspace {
                chain.push(w.spec.clone());
                parent_name = Some(w.name_any());
            }
            chain.push(policy.spec.clone());
            Some((chain, parent_name))
        }
    }
}

fn find_global(universe: &[SessionPrivacyPolicy]) -> Option<&SessionPrivacyPolicy> {
    universe.iter().find(|p| p.spec.level == PolicyLevel::Global)
}

fn find_workspace_for_namespace<'a>(universe: &'a [SessionPrivacyPolicy], namespace: &str) -> Option<&'a SessionPrivacyPolicy> {
    universe
        .iter()
        .find(|p| p.spec.level == PolicyLevel::Workspace && p.spec.workspace_ref.as_deref() == Some(namespace))
}

/// Children of `policy`: resources the publisher must touch so they requeue
/// after this policy's effective document changes.
async fn touch_children(client: &Client, policy: &SessionPrivacyPolicy, universe: &[SessionPrivacyPolicy]) -> Result<()> {
    let generation = policy.meta().generation.unwrap_or_default();
    let children = match policy.spec.level {
        PolicyLevel::Global => universe
            .iter()
            .filter(|p| p.spec.level == PolicyLevel::Workspace || (p.spec.level == PolicyLevel::Agent && find_workspace_for_namespace(universe, &p.namespace().unwrap_or_default()).is_none()))
            .collect::<Vec<_>>(),
        PolicyLevel::Workspace => universe
            .iter()
            .filter(|p| p.spec.level == PolicyLevel::Agent && p.namespace().as_deref() == policy.spec.workspace_ref.as_deref())
            .collect::<Vec<_>>(),
        PolicyLevel::Agent => Vec::new(),
    };

    for child in children {
        let Some(namespace) = child.namespace() else { continue };
        let api: Api<SessionPrivacyPolicy> = Api::namespaced(client.clone(), &namespace);
        let patch = serde_json::json!({ "metadata": { "annotations": { TOUCHED_BY_ANNOTATION: generation.to_string() } } });
        let _ = api.patch(&child.name_any(), &PatchParams::apply(MANAGED_BY_VALUE), &Patch::Merge(&patch)).await;
    }
    Ok(())
}

async fn publish_effective_policy(client: &Client, shared_namespace: &str, policy_name: &str, level: &PolicyLevel, effective: &PrivacyPolicySpec, parent_name: Option<&str>) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), shared_namespace);
    let name = format!("effective-policy-{policy_name}");

    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels.insert(LEVEL_LABEL.to_string(), level_label(level).to_string());

    let mut data = BTreeMap::new();
    data.insert("effective-policy".to_string(), serde_json::to_string(effective)?);
    data.insert("parent-policy".to_string(), parent_name.unwrap_or_default().to_string());

    let desired = ConfigMap {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(shared_namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    };

    match api.get_opt(&name).await? {
        Some(_) => {
            api.replace(&name, &Default::default(), &desired).await?;
        }
        None => {
            api.create(&Default::default(), &desired).await?;
        }
    }
    Ok(())
}

pub async fn cleanup_published_policy(client: &Client, shared_namespace: &str, policy_name: &str) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), shared_namespace);
    let name = format!("effective-policy-{policy_name}");
    if api.get_opt(&name).await?.is_some() {
        api.delete(&name, &Default::default()).await?;
    }
    Ok(())
}

fn level_label(level: &PolicyLevel) -> &'static str {
    match level {
        PolicyLevel::Global => "global",
        PolicyLevel::Workspace => "workspace",
        PolicyLevel::Agent => "agent",
    }
}

fn to_core_spec(spec: &SessionPrivacyPolicySpec) -> PrivacyPolicySpec {
    PrivacyPolicySpec {
        level: Some(match spec.level {
            PolicyLevel::Global => core_policy::PolicyLevel::Global,
            PolicyLevel::Workspace => core_policy::PolicyLevel::Workspace,
            PolicyLevel::Agent => core_policy::PolicyLevel::Agent,
        }),
        recording: core_policy::RecordingSpec { enabled: spec.recording.enabled, facade_data: spec.recording.facade_data, rich_data: spec.recording.rich_data },
        pii: core_policy::PiiSpec { redact: spec.pii.redact, encrypt: spec.pii.encrypt, patterns: spec.pii.patterns.clone() },
        user_opt_out: core_policy::UserOptOutSpec { enabled: spec.user_opt_out.enabled, honor_delete_requests: spec.user_opt_out.honor_delete_requests },
        retention: core_policy::RetentionSpec {
            facade: core_policy::RetentionTier {
                warm_days: spec.retention.facade.warm_days,
                cold_days: spec.retention.facade.cold_days,
                delete_within_days: spec.retention.facade.delete_within_days,
                retention_days: spec.retention.facade.retention_days,
            },
            rich_data: core_policy::RetentionTier {
                warm_days: spec.retention.rich_data.warm_days,
                cold_days: spec.retention.rich_data.cold_days,
                delete_within_days: spec.retention.rich_data.delete_within_days,
                retention_days: spec.retention.rich_data.retention_days,
            },
        },
        encryption: core_policy::EncryptionSpec { enabled: spec.encryption.enabled, kms_provider: spec.encryption.kms_provider.clone(), key_id: spec.encryption.key_id.clone() },
        audit_log_enabled: spec.audit_log_enabled,
    }
}

async fn patch_status(api: &Api<SessionPrivacyPolicy>, policy: &SessionPrivacyPolicy, status: SessionPrivacyPolicyStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    match api.patch_status(&policy.name_any(), &PatchParams::apply("arena-operator"), &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(error) => util::conflict_to_requeue(error).map(|_| ()).or(Ok(())),
    }
}

fn ready(reason: &str, message: &str) -> Condition {
    Condition { type_: reason.into(), status: ConditionStatus::True, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: chrono::Utc::now() }
}

fn not_ready(reason: &str, message: &str) -> Condition {
    Condition { type_: reason.into(), status: ConditionStatus::False, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: chrono::Utc::now() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(level: PolicyLevel, workspace_ref: Option<&str>) -> SessionPrivacyPolicySpec {
        SessionPrivacyPolicySpec {
            level,
            workspace_ref: workspace_ref.map(str::to_string),
            agent_ref: None,
            recording: Default::default(),
            pii: Default::default(),
            user_opt_out: Default::default(),
            retention: Default::default(),
            encryption: Default::default(),
            audit_log_enabled: false,
        }
    }

    #[test]
    fn to_core_spec_preserves_level() {
        let core = to_core_spec(&spec(PolicyLevel::Workspace, Some("team-a")));
        assert_eq!(core.level, Some(core_policy::PolicyLevel::Workspace));
    }

    #[test]
    fn level_label_matches_lowercase_variants() {
        assert_eq!(level_label(&PolicyLevel::Global), "global");
        assert_eq!(level_label(&PolicyLevel::Agent), "agent");
    }
}
