// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressable filesystem versioner (C1).
//!
//! `sync` promotes a fetched artifact tree into `{workspace}/.arena/versions/{version}/`
//! and atomically repoints `HEAD` at it; `gc` trims old versions beyond a
//! bounded history. `HEAD`'s rename is the only commit point — everything
//! before it is safe to retry.

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use arena_core::short as short_str;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::StorageError;

pub const DEFAULT_MAX_VERSIONS: usize = 10;
const MIN_MAX_VERSIONS: usize = 1;

fn to_io(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.display().to_string(), source }
}

/// Derives the 12-hex-char version from a checksum, falling back to hashing
/// the artifact tree in sorted path order when the checksum is malformed or
/// too short.
pub fn derive_version(checksum: &str, artifact_tree: &Path) -> Result<String, StorageError> {
    let is_valid_hex = checksum.len() >= arena_core::artifact::VERSION_LEN && checksum.chars().all(|c| c.is_ascii_hexdigit());
    if is_valid_hex {
        return Ok(short_str(checksum, arena_core::artifact::VERSION_LEN).to_string());
    }
    let hash = hash_tree(artifact_tree)?;
    Ok(short_str(&hash, arena_core::artifact::VERSION_LEN).to_string())
}

/// Hashes every regular file under `root`, in sorted relative-path order, so
/// the same tree always produces the same digest regardless of traversal order.
fn hash_tree(root: &Path) -> Result<String, StorageError> {
    let mut paths = Vec::new();
    collect_files(root, root, &mut paths)?;
    paths.sort();

    let mut hasher = Sha256::new();
    for relative in &paths {
        hasher.update(relative.to_string_lossy().as_bytes());
        let bytes = fs::read(root.join(relative)).map_err(|e| to_io(&root.join(relative), e))?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StorageError> {
    for entry in fs::read_dir(dir).map_err(|e| to_io(dir, e))? {
        let entry = entry.map_err(|e| to_io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| to_io(&path, e))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}

/// Syncs `artifact_tree` into `workspace_path/.arena/versions/{version}` and
/// promotes `HEAD`. Returns `(relative_content_path, version)`.
pub fn sync(artifact_tree: &Path, workspace_path: &Path, checksum: &str, max_versions: usize) -> Result<(String, String), StorageError> {
    let version = derive_version(checksum, artifact_tree)?;
    let arena_dir = workspace_path.join(".arena");
    let versions_dir = arena_dir.join("versions");
    fs::create_dir_all(&versions_dir).map_err(|e| to_io(&versions_dir, e))?;

    let target = versions_dir.join(&version);
    if !target.exists() {
        promote_version(artifact_tree, &target)?;
    }

    promote_head(&arena_dir, &version)?;

    if let Err(e) = gc(&versions_dir, max_versions) {
        warn!(error = %e, "version GC failed after sync, continuing");
    }

    let content_path = target.strip_prefix(workspace_path).unwrap_or(&target).to_string_lossy().into_owned();
    Ok((content_path, version))
}

fn promote_version(artifact_tree: &Path, target: &Path) -> Result<(), StorageError> {
    match fs::rename(artifact_tree, target) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Cross-device rename fails with EXDEV; fall back to a recursive copy.
            if let Err(e) = copy_recursive(artifact_tree, target) {
                let _ = fs::remove_dir_all(target);
                return Err(e);
            }
            Ok(())
        }
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dst).map_err(|e| to_io(dst, e))?;
    for entry in fs::read_dir(src).map_err(|e| to_io(src, e))? {
        let entry = entry.map_err(|e| to_io(src, e))?;
        let file_type = entry.file_type().map_err(|e| to_io(&entry.path(), e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_symlink() {
            let link_target = fs::read_link(&src_path).map_err(|e| to_io(&src_path, e))?;
            symlink(&link_target, &dst_path).map_err(|e| to_io(&dst_path, e))?;
        } else if file_type.is_dir() {
            copy_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| to_io(&dst_path, e))?;
            let mode = fs::metadata(&src_path).map_err(|e| to_io(&src_path, e))?.permissions().mode();
            fs::set_permissions(&dst_path, fs::Permissions::from_mode(mode)).map_err(|e| to_io(&dst_path, e))?;
        }
    }
    Ok(())
}

fn promote_head(arena_dir: &Path, version: &str) -> Result<(), StorageError> {
    let head = arena_dir.join("HEAD");
    let head_tmp = arena_dir.join("HEAD.tmp");
    fs::write(&head_tmp, version).map_err(|e| to_io(&head_tmp, e))?;
    fs::rename(&head_tmp, &head).map_err(|e| to_io(&head, e))?;
    Ok(())
}

/// Removes version directories beyond `max` (default [`DEFAULT_MAX_VERSIONS`],
/// floor [`MIN_MAX_VERSIONS`]), oldest first by mtime. Non-directories under
/// `versions_dir` are ignored.
pub fn gc(versions_dir: &Path, max: usize) -> Result<(), StorageError> {
    let max = max.max(MIN_MAX_VERSIONS);
    if !versions_dir.exists() {
        return Ok(());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(versions_dir).map_err(|e| to_io(versions_dir, e))? {
        let entry = entry.map_err(|e| to_io(versions_dir, e))?;
        if !entry.file_type().map_err(|e| to_io(&entry.path(), e))?.is_dir() {
            continue;
        }
        let mtime = entry.metadata().map_err(|e| to_io(&entry.path(), e))?.modified().map_err(|e| to_io(&entry.path(), e))?;
        entries.push((mtime, entry.path()));
    }
    entries.sort_by_key(|(mtime, _)| *mtime);

    if entries.len() <= max {
        return Ok(());
    }

    let to_remove = &entries[..entries.len() - max];
    let mut first_err = None;
    for (_, path) in to_remove {
        match fs::remove_dir_all(path) {
            Ok(()) => info!(path = %path.display(), "garbage collected version"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove old version");
                first_err.get_or_insert(to_io(path, e));
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "versioner_tests.rs"]
mod tests;
