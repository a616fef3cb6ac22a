// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git fetcher: clones `url` at a branch/tag/commit ref, optionally scoped to
//! a sub-path. `git2` is blocking, so every call runs inside
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{FetchOptions, RemoteCallbacks, Repository};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::DriverError;

use super::{FetchedArtifact, Fetcher};

#[derive(Clone)]
pub struct GitFetcher {
    pub url: String,
    pub reference: String,
    pub sub_path: Option<String>,
    pub credentials: Credentials,
}

fn credential_callbacks(credentials: &Credentials) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    match credentials.clone() {
        Credentials::Ssh { identity, .. } => {
            callbacks.credentials(move |_url, username, _allowed| git2::Cred::ssh_key_from_memory(username.unwrap_or("git"), None, &identity, None));
        }
        Credentials::Basic { username, password } => {
            callbacks.credentials(move |_url, _username, _allowed| git2::Cred::userpass_plaintext(&username, &password));
        }
        _ => {}
    }
    callbacks
}

fn fetch_options(credentials: &Credentials) -> FetchOptions<'static> {
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(credential_callbacks(credentials));
    opts
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn latest_revision(&self) -> Result<String, DriverError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.resolve_remote_head()).await?
    }

    async fn fetch(&self, revision: &str, dest: &Path) -> Result<FetchedArtifact, DriverError> {
        let this = self.clone();
        let revision = revision.to_string();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || this.clone_at(&revision, &dest)).await?
    }
}

impl GitFetcher {
    fn resolve_remote_head(&self) -> Result<String, DriverError> {
        let mut remote = git2::Remote::create_detached(&self.url)?;
        remote.connect_auth(git2::Direction::Fetch, Some(credential_callbacks(&self.credentials)), None)?;
        let refs = remote.list()?;
        let wanted = format!("refs/heads/{}", self.reference);
        let found = refs
            .iter()
            .find(|r| r.name() == wanted || r.name() == self.reference)
            .or_else(|| refs.iter().find(|r| r.name() == "HEAD"))
            .ok_or_else(|| DriverError::UnsupportedOrigin(format!("ref {} not found at {}", self.reference, self.url)))?;
        Ok(found.oid().to_string())
    }

    fn clone_at(&self, revision: &str, dest: &Path) -> Result<FetchedArtifact, DriverError> {
        let repo = Repository::init(dest)?;
        {
            let mut remote = repo.remote_anonymous(&self.url)?;
            let mut opts = fetch_options(&self.credentials);
            remote.fetch(&[revision], Some(&mut opts), None)?;
        }
        let oid = git2::Oid::from_str(revision)
            .or_else(|_| repo.refname_to_id(&format!("refs/remotes/origin/{revision}")))
            .or_else(|_| repo.refname_to_id(revision))?;
        let commit = repo.find_commit(oid)?;
        repo.checkout_tree(commit.as_object(), None)?;
        repo.set_head_detached(oid)?;

        let content_root = match &self.sub_path {
            Some(sub) => dest.join(sub),
            None => dest.to_path_buf(),
        };
        let (checksum, size) = hash_and_size(&content_root)?;
        Ok(FetchedArtifact { revision: oid.to_string(), checksum, size })
    }
}

fn hash_and_size(root: &Path) -> Result<(String, u64), DriverError> {
    let mut hasher = Sha256::new();
    let mut size = 0u64;
    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort();
    for relative in entries {
        let full = root.join(&relative);
        let bytes = std::fs::read(&full)?;
        size += bytes.len() as u64;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(&bytes);
    }
    Ok((hex::encode(hasher.finalize()), size))
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DriverError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().map(|n| n == ".git").unwrap_or(false) {
                continue;
            }
            walk(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_size_is_order_independent() {
        let a = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(a.path().join("sub")).unwrap();
        std::fs::write(a.path().join("sub/b.txt"), "y").unwrap();

        let b = tempfile::tempdir().unwrap();
        std::fs::create_dir(b.path().join("sub")).unwrap();
        std::fs::write(b.path().join("sub/b.txt"), "y").unwrap();
        std::fs::write(b.path().join("a.txt"), "x").unwrap();

        assert_eq!(hash_and_size(a.path()).unwrap(), hash_and_size(b.path()).unwrap());
    }

    #[test]
    fn hash_and_size_of_missing_dir_is_empty() {
        let (checksum, size) = hash_and_size(Path::new("/nonexistent/path/for/test")).unwrap();
        assert_eq!(size, 0);
        assert_eq!(checksum.len(), 64);
    }
}
