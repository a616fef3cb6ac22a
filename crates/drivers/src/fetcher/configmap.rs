// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ConfigMap fetcher: materialises a `core/v1 ConfigMap`'s keys as files
//! under the destination tree. The ConfigMap's `resourceVersion` stands in
//! for a revision since ConfigMaps have no content-addressed identifier of
//! their own.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use sha2::{Digest, Sha256};

use crate::error::DriverError;

use super::{FetchedArtifact, Fetcher};

pub struct ConfigMapFetcher {
    pub client: Client,
    pub namespace: String,
    pub name: String,
}

impl ConfigMapFetcher {
    fn api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl Fetcher for ConfigMapFetcher {
    async fn latest_revision(&self) -> Result<String, DriverError> {
        let cm = self.api().get(&self.name).await?;
        Ok(cm.metadata.resource_version.unwrap_or_default())
    }

    async fn fetch(&self, revision: &str, dest: &Path) -> Result<FetchedArtifact, DriverError> {
        let cm = self.api().get(&self.name).await?;
        std::fs::create_dir_all(dest)?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut keys: Vec<(String, Vec<u8>)> = Vec::new();

        if let Some(data) = cm.data {
            keys.extend(data.into_iter().map(|(k, v)| (k, v.into_bytes())));
        }
        if let Some(binary_data) = cm.binary_data {
            keys.extend(binary_data.into_iter().map(|(k, v)| (k, v.0)));
        }
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, bytes) in &keys {
            std::fs::write(dest.join(key), bytes)?;
            size += bytes.len() as u64;
            hasher.update(key.as_bytes());
            hasher.update(bytes);
        }

        let checksum = hex::encode(hasher.finalize());
        let revision = if revision.is_empty() { cm.metadata.resource_version.unwrap_or_default() } else { revision.to_string() };
        Ok(FetchedArtifact { revision, checksum, size })
    }
}
