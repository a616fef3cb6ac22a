// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! License activation client (C13). Talks to the licensing backend over
//! HTTPS; the reconciler drives activation, heartbeat, and deactivation on
//! its own schedule and decides what a grace-period degradation means.

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

#[derive(Debug, Clone, Serialize)]
pub struct ActivationRequest {
    pub license_key: String,
    pub cluster_fingerprint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationResponse {
    pub license_id: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub seats: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

pub struct LicenseClient {
    http: reqwest::Client,
    base_url: String,
}

impl LicenseClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DriverError> {
        Ok(Self { http: reqwest::Client::builder().build()?, base_url: base_url.into() })
    }

    pub async fn activate(&self, license_key: &str, cluster_fingerprint: &str) -> Result<ActivationResponse, DriverError> {
        let url = format!("{}/v1/licenses/activate", self.base_url);
        let request = ActivationRequest { license_key: license_key.to_string(), cluster_fingerprint: cluster_fingerprint.to_string() };
        let response = self.http.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(DriverError::LicenseRejected(format!("activation returned {}", response.status())));
        }
        Ok(response.json().await?)
    }

    pub async fn heartbeat(&self, license_id: &str) -> Result<HeartbeatResponse, DriverError> {
        let url = format!("{}/v1/licenses/{license_id}/heartbeat", self.base_url);
        let response = self.http.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(DriverError::LicenseRejected(format!("heartbeat returned {}", response.status())));
        }
        Ok(response.json().await?)
    }

    pub async fn deactivate(&self, license_id: &str) -> Result<(), DriverError> {
        let url = format!("{}/v1/licenses/{license_id}", self.base_url);
        let response = self.http.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(DriverError::LicenseRejected(format!("deactivation returned {}", response.status())));
        }
        Ok(())
    }
}

/// SHA-256 of the sorted namespace UIDs, used as a stable per-cluster
/// identity that doesn't require a dedicated cluster-id resource.
pub fn cluster_fingerprint(mut namespace_uids: Vec<String>) -> String {
    use sha2::{Digest, Sha256};
    namespace_uids.sort();
    let mut hasher = Sha256::new();
    for uid in &namespace_uids {
        hasher.update(uid.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_independent() {
        let a = cluster_fingerprint(vec!["b".into(), "a".into()]);
        let b = cluster_fingerprint(vec!["a".into(), "b".into()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_membership() {
        let a = cluster_fingerprint(vec!["a".into()]);
        let b = cluster_fingerprint(vec!["a".into(), "b".into()]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn activate_against_unreachable_server_errors() {
        let client = LicenseClient::new("http://127.0.0.1:1").unwrap();
        let result = client.activate("key", "fingerprint").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn activate_round_trips_against_mock_server() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/licenses/activate"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "license_id": "lic-1",
                "expires_at": "2026-01-01T00:00:00Z",
                "seats": 5,
            })))
            .mount(&server)
            .await;

        let client = LicenseClient::new(server.uri()).unwrap();
        let response = client.activate("key", "fingerprint").await.unwrap();
        assert_eq!(response.license_id, "lic-1");
        assert_eq!(response.seats, 5);
    }
}
