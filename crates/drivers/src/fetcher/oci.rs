// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OCI fetcher: pulls a single-layer artifact image over HTTPS and unpacks
//! its one layer tarball into the destination tree.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::DriverError;

use super::{FetchedArtifact, Fetcher};

pub struct OciFetcher {
    pub registry: String,
    pub repository: String,
    pub reference: String,
    pub insecure: bool,
    pub credentials: Credentials,
}

#[derive(Deserialize)]
struct Manifest {
    layers: Vec<Layer>,
}

#[derive(Deserialize)]
struct Layer {
    digest: String,
}

impl OciFetcher {
    fn base_url(&self) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{scheme}://{}/v2/{}", self.registry, self.repository)
    }

    fn client(&self) -> Result<reqwest::Client, DriverError> {
        let mut builder = reqwest::Client::builder();
        if let Credentials::Basic { .. } = &self.credentials {
            // Auth header applied per-request below; builder left default.
        }
        Ok(builder.build()?)
    }

    fn auth_header(&self) -> Option<String> {
        match &self.credentials {
            Credentials::Basic { username, password } => {
                let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                Some(format!("Basic {token}"))
            }
            Credentials::DockerConfig { json } => Some(format!("Bearer {json}")),
            _ => None,
        }
    }
}

#[async_trait]
impl Fetcher for OciFetcher {
    async fn latest_revision(&self) -> Result<String, DriverError> {
        let client = self.client()?;
        let url = format!("{}/manifests/{}", self.base_url(), self.reference);
        let mut request = client.head(&url).header("Accept", "application/vnd.oci.image.manifest.v1+json");
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", auth);
        }
        let response = request.send().await?;
        Ok(response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&self.reference)
            .to_string())
    }

    async fn fetch(&self, revision: &str, dest: &Path) -> Result<FetchedArtifact, DriverError> {
        let client = self.client()?;

        let manifest_url = format!("{}/manifests/{revision}", self.base_url());
        let mut request = client.get(&manifest_url).header("Accept", "application/vnd.oci.image.manifest.v1+json");
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", auth.clone());
        }
        let manifest: Manifest = request.send().await?.json().await?;
        let layer = manifest.layers.first().ok_or_else(|| DriverError::UnsupportedOrigin("manifest has no layers".into()))?;

        let blob_url = format!("{}/blobs/{}", self.base_url(), layer.digest);
        let mut blob_request = client.get(&blob_url);
        if let Some(auth) = self.auth_header() {
            blob_request = blob_request.header("Authorization", auth);
        }
        let bytes = blob_request.send().await?.bytes().await?;

        std::fs::create_dir_all(dest)?;
        let mut archive = tar::Archive::new(Cursor::new(bytes.as_ref()));
        archive.unpack(dest)?;

        let checksum = hex::encode(Sha256::digest(bytes.as_ref()));
        Ok(FetchedArtifact { revision: revision.to_string(), checksum, size: bytes.len() as u64 })
    }
}
