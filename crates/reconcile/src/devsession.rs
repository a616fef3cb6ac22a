// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dev-session engine (C12): `pending → starting → ready → (idle sweep)
//! stopping → stopped`, with per-session child resources torn down through a
//! finalizer rather than relying on owner-reference garbage collection alone
//! (the `ServiceAccount`/`Role`/`RoleBinding` trio needs an explicit delete
//! order the GC doesn't guarantee).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::batch::v1::{Job as K8sJob, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};

use arena_core::derive_child_name;
use arena_crds::devsession::{ArenaDevSession, ArenaDevSessionStatus, DevSessionPhase, CLEANUP_FINALIZER};

use crate::error::{ReconcileError, Result};
use crate::util;

const NAME_PREFIX: &str = "adc-";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_IMAGE: &str = "arena-devsession:latest";
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY_VALUE: &str = "arena-operator";
const SESSION_LABEL: &str = "arena.dev/dev-session";

pub struct DevSessionContext {
    pub client: Client,
    pub events: util::EventRecorder,
}

pub async fn reconcile_dev_session(session: Arc<ArenaDevSession>, ctx: Arc<DevSessionContext>) -> Result<Action> {
    let Some(namespace) = session.namespace() else {
        return Err(ReconcileError::MissingNamespace { kind: "ArenaDevSession", namespace: String::new(), name: session.name_any() });
    };
    let api: Api<ArenaDevSession> = Api::namespaced(ctx.client.clone(), &namespace);
    let events = ctx.events.for_resource(&*session);

    if session.meta().deletion_timestamp.is_some() {
        return teardown(&api, &session, &namespace, &ctx, &events).await;
    }

    if !session.finalizers().iter().any(|f| f == CLEANUP_FINALIZER) {
        add_finalizer(&api, &session).await?;
    }

    let mut status = session.status.clone().unwrap_or_default();
    status.observed_generation = session.meta().generation.unwrap_or_default();

    match status.phase {
        None | Some(DevSessionPhase::Pending) => start(&api, &session, &namespace, &mut status, &ctx, &events).await,
        Some(DevSessionPhase::Starting) => check_ready(&api, &session, &namespace, &mut status, &ctx, &events).await,
        Some(DevSessionPhase::Ready) => check_idle(&api, &session, &mut status, &ctx, &events).await,
        Some(DevSessionPhase::Stopping) => finish_stopping(&api, &session, &namespace, &mut status, &ctx, &events).await,
        Some(DevSessionPhase::Stopped) | Some(DevSessionPhase::Failed) => Ok(Action::await_change()),
    }
}

pub fn on_error_dev_session(session: Arc<ArenaDevSession>, error: &ReconcileError, _ctx: Arc<DevSessionContext>) -> Action {
    tracing::error!(name = %session.name_any(), namespace = ?session.namespace(), error = %error, "ArenaDevSession reconcile failed");
    Action::requeue(Duration::from_secs(10))
}

pub fn child_name(session_name: &str) -> String {
    derive_child_name(NAME_PREFIX, session_name)
}

fn idle_timeout(session: &ArenaDevSession) -> Duration {
    session.spec.idle_timeout.as_deref().and_then(|raw| humantime::parse_duration(raw).ok()).unwrap_or(DEFAULT_IDLE_TIMEOUT)
}

async fn add_finalizer(api: &Api<ArenaDevSession>, session: &ArenaDevSession) -> Result<()> {
    let mut finalizers = session.finalizers().to_vec();
    finalizers.push(CLEANUP_FINALIZER.to_string());
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&session.name_any(), &PatchParams::apply(MANAGED_BY_VALUE), &Patch::Merge(&patch)).await?;
    Ok(())
}

async fn start(api: &Api<ArenaDevSession>, session: &ArenaDevSession, namespace: &str, status: &mut ArenaDevSessionStatus, ctx: &DevSessionContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let name = child_name(&session.name_any());
    if let Err(error) = materialise_children(&ctx.client, namespace, &name, session).await {
        status.phase = Some(DevSessionPhase::Failed);
        util::set_condition(&mut status.conditions, not_ready("Ready", &error.to_string()));
        patch_status(api, session, status.clone()).await?;
        return Ok(Action::await_change());
    }

    status.phase = Some(DevSessionPhase::Starting);
    status.service_name = Some(name);
    status.started_at = Some(Utc::now());
    status.last_activity_at = Some(Utc::now());
    util::set_condition(&mut status.conditions, not_ready("Ready", "session resources materialising"));
    patch_status(api, session, status.clone()).await?;
    events.emit(EventType::Normal, "SessionStarting", "dev session resources created", "Reconcile").await;

    Ok(Action::requeue(Duration::from_secs(3)))
}

async fn check_ready(api: &Api<ArenaDevSession>, session: &ArenaDevSession, namespace: &str, status: &mut ArenaDevSessionStatus, ctx: &DevSessionContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let name = child_name(&session.name_any());
    let jobs: Api<K8sJob> = Api::namespaced(ctx.client.clone(), namespace);
    let Some(job) = jobs.get_opt(&name).await? else {
        return Ok(Action::requeue(Duration::from_secs(3)));
    };
    let ready_replicas = job.status.as_ref().and_then(|s| s.ready).unwrap_or(0);

    if ready_replicas >= 1 {
        status.phase = Some(DevSessionPhase::Ready);
        status.endpoint = Some(format!("ws://{name}.{namespace}.svc.cluster.local/ws"));
        status.last_activity_at = Some(Utc::now());
        util::set_condition(&mut status.conditions, ready("Ready", "dev session ready"));
        patch_status(api, session, status.clone()).await?;
        events.emit(EventType::Normal, "SessionReady", "dev session is ready", "Reconcile").await;
        return Ok(Action::requeue(Duration::from_secs(30)));
    }

    Ok(Action::requeue(Duration::from_secs(3)))
}

async fn check_idle(api: &Api<ArenaDevSession>, session: &ArenaDevSession, status: &mut ArenaDevSessionStatus, ctx: &DevSessionContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let last_activity = status.last_activity_at.unwrap_or_else(Utc::now);
    let idle_for = (Utc::now() - last_activity).to_std().unwrap_or_default();

    if idle_for >= idle_timeout(session) {
        status.phase = Some(DevSessionPhase::Stopping);
        util::set_condition(&mut status.conditions, not_ready("Ready", "idle timeout exceeded"));
        patch_status(api, session, status.clone()).await?;
        events.emit(EventType::Normal, "SessionIdle", "idle timeout exceeded; stopping session", "Reconcile").await;
        return Ok(Action::requeue(Duration::from_secs(3)));
    }

    Ok(Action::requeue(Duration::from_secs(30)))
}

async fn finish_stopping(api: &Api<ArenaDevSession>, session: &ArenaDevSession, namespace: &str, status: &mut ArenaDevSessionStatus, ctx: &DevSessionContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let name = child_name(&session.name_any());
    delete_children(&ctx.client, namespace, &name).await?;
    status.phase = Some(DevSessionPhase::Stopped);
    util::set_condition(&mut status.conditions, not_ready("Ready", "session stopped"));
    patch_status(api, session, status.clone()).await?;
    events.emit(EventType::Normal, "SessionStopped", "dev session stopped", "Reconcile").await;
    Ok(Action::await_change())
}

async fn teardown(api: &Api<ArenaDevSession>, session: &ArenaDevSession, namespace: &str, ctx: &DevSessionContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    if !session.finalizers().iter().any(|f| f == CLEANUP_FINALIZER) {
        return Ok(Action::await_change());
    }
    let name = child_name(&session.name_any());
    delete_children(&ctx.client, namespace, &name).await?;

    let finalizers: Vec<String> = session.finalizers().iter().filter(|f| f.as_str() != CLEANUP_FINALIZER).cloned().collect();
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&session.name_any(), &PatchParams::apply(MANAGED_BY_VALUE), &Patch::Merge(&patch)).await?;
    events.emit(EventType::Normal, "SessionDeleted", "dev session torn down", "Reconcile").await;
    Ok(Action::await_change())
}

async fn materialise_children(client: &Client, namespace: &str, name: &str, session: &ArenaDevSession) -> Result<()> {
    let mut labels = BTreeMap::new();
    labels.insert(SESSION_LABEL.to_string(), session.name_any());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());

    let sa_api: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    let sa = ServiceAccount { metadata: meta(name, namespace, &labels), ..Default::default() };
    sa_api.patch(name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&sa)).await?;

    let role_api: Api<Role> = Api::namespaced(client.clone(), namespace);
    let role = Role {
        metadata: meta(name, namespace, &labels),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec!["pods".to_string(), "pods/log".to_string()]),
            verbs: vec!["get".to_string(), "list".to_string(), "watch".to_string()],
            ..Default::default()
        }]),
    };
    role_api.patch(name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&role)).await?;

    let binding_api: Api<RoleBinding> = Api::namespaced(client.clone(), namespace);
    let binding = RoleBinding {
        metadata: meta(name, namespace, &labels),
        role_ref: RoleRef { api_group: "rbac.authorization.k8s.io".to_string(), kind: "Role".to_string(), name: name.to_string() },
        subjects: Some(vec![Subject { kind: "ServiceAccount".to_string(), name: name.to_string(), namespace: Some(namespace.to_string()), ..Default::default() }]),
    };
    binding_api.patch(name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&binding)).await?;

    let container = Container {
        name: "devsession".to_string(),
        image: Some(session.spec.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string())),
        ..Default::default()
    };
    let pod_spec = PodSpec { containers: vec![container], restart_policy: Some("Never".to_string()), service_account_name: Some(name.to_string()), ..Default::default() };
    let job_api: Api<K8sJob> = Api::namespaced(client.clone(), namespace);
    let job = K8sJob {
        metadata: meta(name, namespace, &labels),
        spec: Some(JobSpec {
            parallelism: Some(1),
            completions: Some(1),
            template: PodTemplateSpec { metadata: Some(meta(name, namespace, &labels)), spec: Some(pod_spec) },
            ..Default::default()
        }),
        status: None,
    };
    job_api.patch(name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&job)).await?;

    let service_api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = Service {
        metadata: meta(name, namespace, &labels),
        spec: Some(ServiceSpec {
            selector: Some(labels.clone()),
            ports: Some(vec![ServicePort { port: 80, target_port: Some(IntOrString::Int(8080)), ..Default::default() }]),
            ..Default::default()
        }),
        status: None,
    };
    service_api.patch(name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&service)).await?;

    Ok(())
}

async fn delete_children(client: &Client, namespace: &str, name: &str) -> Result<()> {
    let _ = Api::<Service>::namespaced(client.clone(), namespace).delete(name, &Default::default()).await;
    let _ = Api::<K8sJob>::namespaced(client.clone(), namespace).delete(name, &Default::default()).await;
    let _ = Api::<RoleBinding>::namespaced(client.clone(), namespace).delete(name, &Default::default()).await;
    let _ = Api::<Role>::namespaced(client.clone(), namespace).delete(name, &Default::default()).await;
    let _ = Api::<ServiceAccount>::namespaced(client.clone(), namespace).delete(name, &Default::default()).await;
    Ok(())
}

fn meta(name: &str, namespace: &str, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta { name: Some(name.to_string()), namespace: Some(namespace.to_string()), labels: Some(labels.clone()), ..Default::default() }
}

async fn patch_status(api: &Api<ArenaDevSession>, session: &ArenaDevSession, status: ArenaDevSessionStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    match api.patch_status(&session.name_any(), &PatchParams::apply("arena-operator"), &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(error) => util::conflict_to_requeue(error).map(|_| ()).or(Ok(())),
    }
}

fn ready(reason: &str, message: &str) -> arena_crds::Condition {
    arena_crds::Condition { type_: "Ready".into(), status: arena_crds::ConditionStatus::True, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: Utc::now() }
}

fn not_ready(reason: &str, message: &str) -> arena_crds::Condition {
    arena_crds::Condition { type_: "Ready".into(), status: arena_crds::ConditionStatus::False, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: Utc::now() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_name_fits_under_limit_for_short_names() {
        assert_eq!(child_name("demo"), "adc-demo");
    }

    #[test]
    fn child_name_truncates_long_names_with_hash_suffix() {
        let long = "x".repeat(80);
        let derived = child_name(&long);
        assert!(derived.len() <= 63);
        assert!(derived.starts_with(NAME_PREFIX));
    }
}
