// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! License-activation loop (C13). Unlike the other engines this isn't a
//! `Controller` over a CRD kind — it reconciles exactly one fixed
//! `core/v1 Secret`, so `arena-operator` runs it as a standalone polling
//! task instead of registering a watch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Patch, PatchParams};
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};
use serde::{Deserialize, Serialize};

use arena_drivers::license::{cluster_fingerprint, LicenseClient};

use crate::error::Result;
use crate::util;

pub const DEFAULT_LICENSE_SECRET: &str = "arena-license";
pub const DEFAULT_LICENSE_NAMESPACE: &str = "arena-system";
const STATE_CONFIGMAP: &str = "arena-license-state";
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);
const HEARTBEAT_GRACE_PERIOD: Duration = Duration::from_secs(72 * 3600);
const FAILURE_RETRY_INTERVAL: Duration = Duration::from_secs(3600);
const TRANSPORT_ERROR_RETRY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ActivationState {
    activation_id: String,
    fingerprint: String,
    license_id: String,
    activated_at: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    failure_count: u32,
}

pub struct LicenseContext {
    pub client: Client,
    pub license_client: LicenseClient,
    pub secret_name: String,
    pub secret_namespace: String,
    pub cluster_name: String,
    pub version: String,
    pub events: util::EventRecorder,
}

/// Runs forever, polling and sleeping for whatever interval the last pass
/// decided (activation cadence, heartbeat cadence, or an error backoff).
pub async fn run_license_loop(ctx: LicenseContext) {
    loop {
        let delay = match tick(&ctx).await {
            Ok(delay) => delay,
            Err(error) => {
                tracing::error!(error = %error, "license loop tick failed");
                TRANSPORT_ERROR_RETRY
            }
        };
        tokio::time::sleep(delay).await;
    }
}

async fn tick(ctx: &LicenseContext) -> Result<Duration> {
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &ctx.secret_namespace);
    let Some(secret) = secrets.get_opt(&ctx.secret_name).await? else {
        return Ok(TRANSPORT_ERROR_RETRY);
    };
    let events = ctx.events.for_resource(&secret);
    let data = secret.data.clone().unwrap_or_default();
    let tier = data.get("tier").map(|v| String::from_utf8_lossy(&v.0).into_owned()).unwrap_or_default();
    if tier != "enterprise" {
        return Ok(DEFAULT_HEARTBEAT_INTERVAL);
    }
    let license_key = data.get("licenseKey").map(|v| String::from_utf8_lossy(&v.0).into_owned()).unwrap_or_default();

    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.secret_namespace);
    match load_state(&configmaps).await? {
        Some(state) => heartbeat(ctx, &configmaps, state, &events).await,
        None => activate(ctx, &configmaps, &license_key, &events).await,
    }
}

async fn activate(ctx: &LicenseContext, configmaps: &Api<ConfigMap>, license_key: &str, events: &util::ScopedEventRecorder) -> Result<Duration> {
    let Some(fingerprint) = compute_fingerprint(&ctx.client, &ctx.secret_namespace).await else {
        return Ok(TRANSPORT_ERROR_RETRY);
    };

    match ctx.license_client.activate(license_key, &fingerprint).await {
        Ok(response) => {
            let now = Utc::now();
            let state = ActivationState { activation_id: response.license_id.clone(), fingerprint, license_id: response.license_id, activated_at: now, last_heartbeat: now, failure_count: 0 };
            save_state(configmaps, &state).await?;
            events.emit(EventType::Normal, "LicenseActivated", "license activated", "Activate").await;
            Ok(DEFAULT_HEARTBEAT_INTERVAL)
        }
        Err(arena_drivers::DriverError::LicenseRejected(reason)) => {
            events.emit(EventType::Warning, "LicenseRejected", &reason, "Activate").await;
            Ok(DEFAULT_HEARTBEAT_INTERVAL)
        }
        Err(error) => {
            events.emit(EventType::Warning, "LicenseActivationError", &error.to_string(), "Activate").await;
            Ok(TRANSPORT_ERROR_RETRY)
        }
    }
}

async fn heartbeat(ctx: &LicenseContext, configmaps: &Api<ConfigMap>, mut state: ActivationState, events: &util::ScopedEventRecorder) -> Result<Duration> {
    let elapsed = (Utc::now() - state.last_heartbeat).to_std().unwrap_or_default();
    if elapsed < DEFAULT_HEARTBEAT_INTERVAL {
        return Ok(DEFAULT_HEARTBEAT_INTERVAL - elapsed);
    }

    match ctx.license_client.heartbeat(&state.license_id).await {
        Ok(_) => {
            state.last_heartbeat = Utc::now();
            state.failure_count = 0;
            save_state(configmaps, &state).await?;
            Ok(DEFAULT_HEARTBEAT_INTERVAL)
        }
        Err(error) => {
            state.failure_count += 1;
            let since_last_success = (Utc::now() - state.last_heartbeat).to_std().unwrap_or_default();
            save_state(configmaps, &state).await?;
            if since_last_success >= HEARTBEAT_GRACE_PERIOD {
                events.emit(EventType::Warning, "LicenseHeartbeatGraceExceeded", &format!("heartbeat has failed for over 72h: {error}"), "Heartbeat").await;
            }
            Ok(FAILURE_RETRY_INTERVAL)
        }
    }
}

pub async fn deactivate(ctx: &LicenseContext) -> Result<()> {
    let configmaps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.secret_namespace);
    if let Some(state) = load_state(&configmaps).await? {
        let _ = ctx.license_client.deactivate(&state.license_id).await;
    }
    let _ = configmaps.delete(STATE_CONFIGMAP, &Default::default()).await;
    Ok(())
}

/// SHA-256(sorted `[kube-system UID, operator namespace UID]`), deferred to
/// the next tick when either namespace can't be read.
async fn compute_fingerprint(client: &Client, operator_namespace: &str) -> Option<String> {
    let api: Api<Namespace> = Api::all(client.clone());
    let kube_system_uid = api.get(DEFAULT_LICENSE_NAMESPACE_SENTINEL).await.ok().and_then(|ns| ns.uid());
    let operator_uid = api.get(operator_namespace).await.ok().and_then(|ns| ns.uid());
    match (kube_system_uid, operator_uid) {
        (Some(a), Some(b)) => Some(cluster_fingerprint(vec![a, b])),
        _ => None,
    }
}

const DEFAULT_LICENSE_NAMESPACE_SENTINEL: &str = "kube-system";

async fn load_state(configmaps: &Api<ConfigMap>) -> Result<Option<ActivationState>> {
    let Some(cm) = configmaps.get_opt(STATE_CONFIGMAP).await? else { return Ok(None) };
    let Some(raw) = cm.data.and_then(|d| d.get("state").cloned()) else { return Ok(None) };
    Ok(serde_json::from_str(&raw).ok())
}

async fn save_state(configmaps: &Api<ConfigMap>, state: &ActivationState) -> Result<()> {
    let mut data = std::collections::BTreeMap::new();
    data.insert("state".to_string(), serde_json::to_string(state)?);
    let desired = ConfigMap {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta { name: Some(STATE_CONFIGMAP.to_string()), ..Default::default() },
        data: Some(data),
        ..Default::default()
    };
    match configmaps.get_opt(STATE_CONFIGMAP).await? {
        Some(_) => {
            configmaps.replace(STATE_CONFIGMAP, &Default::default(), &desired).await?;
        }
        None => {
            configmaps.create(&Default::default(), &desired).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_state_round_trips_through_json() {
        let state = ActivationState { activation_id: "a".into(), fingerprint: "f".into(), license_id: "l".into(), activated_at: Utc::now(), last_heartbeat: Utc::now(), failure_count: 2 };
        let json = serde_json::to_string(&state).unwrap();
        let back: ActivationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.failure_count, 2);
    }
}
