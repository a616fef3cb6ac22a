// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loads fetcher credentials from a referenced `core/v1 Secret` (C3).
//!
//! Recognised key sets: `{username, password}` for HTTPS/basic auth,
//! `{identity, known_hosts}` for SSH, and `.dockerconfigjson` for OCI
//! registries. A secret matching none of these shapes is an empty
//! credential set, not an error — some origins (public git, insecure OCI)
//! need none.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

use crate::error::DriverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Ssh { identity: String, known_hosts: String },
    DockerConfig { json: String },
    None,
}

pub async fn load_credentials(client: &Client, namespace: &str, secret_name: &str) -> Result<Credentials, DriverError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api.get(secret_name).await?;
    Ok(from_secret_data(secret_name, secret.data.map(|d| d.into_iter().map(|(k, v)| (k, v.0)).collect())))
}

fn from_secret_data(name: &str, data: Option<BTreeMap<String, Vec<u8>>>) -> Credentials {
    let Some(data) = data else { return Credentials::None };
    let get = |key: &str| data.get(key).map(|v| String::from_utf8_lossy(v).into_owned());

    if let (Some(username), Some(password)) = (get("username"), get("password")) {
        return Credentials::Basic { username, password };
    }
    if let (Some(identity), Some(known_hosts)) = (get("identity"), get("known_hosts")) {
        return Credentials::Ssh { identity, known_hosts };
    }
    if let Some(json) = get(".dockerconfigjson") {
        return Credentials::DockerConfig { json };
    }
    let _ = name;
    Credentials::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.as_bytes().to_vec())).collect()
    }

    #[test]
    fn basic_auth_keys_are_recognised() {
        let creds = from_secret_data("s", Some(data(&[("username", "u"), ("password", "p")])));
        assert_eq!(creds, Credentials::Basic { username: "u".into(), password: "p".into() });
    }

    #[test]
    fn ssh_keys_are_recognised() {
        let creds = from_secret_data("s", Some(data(&[("identity", "key"), ("known_hosts", "host")])));
        assert_eq!(creds, Credentials::Ssh { identity: "key".into(), known_hosts: "host".into() });
    }

    #[test]
    fn docker_config_key_is_recognised() {
        let creds = from_secret_data("s", Some(data(&[(".dockerconfigjson", "{}")])));
        assert_eq!(creds, Credentials::DockerConfig { json: "{}".into() });
    }

    #[test]
    fn unrecognised_shape_is_none() {
        let creds = from_secret_data("s", Some(data(&[("other", "x")])));
        assert_eq!(creds, Credentials::None);
    }

    #[test]
    fn missing_data_is_none() {
        assert_eq!(from_secret_data("s", None), Credentials::None);
    }
}
