//! Test fixtures for seeding shares.

use std::fs;

use anyhow::{Context, Result};
use shuttle_store::LocalStore;
use tempfile::TempDir;

use crate::mocks::MemoryStore;

/// Build an in-memory share holding `files` (`path`, `contents`) pairs.
///
/// # Errors
///
/// Returns an error when a path is invalid or collides with a seeded file.
pub fn memory_share(files: &[(&str, &str)]) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    for (path, contents) in files {
        store
            .add_file(path, contents)
            .with_context(|| format!("failed to seed {path}"))?;
    }
    Ok(store)
}

/// Create a temporary directory holding `files` and open it as a local share.
///
/// The returned [`TempDir`] must outlive the store.
///
/// # Errors
///
/// Returns an error when the directory or any seeded file cannot be written.
pub fn local_share(files: &[(&str, &str)]) -> Result<(TempDir, LocalStore)> {
    let temp = tempfile::Builder::new().prefix("shuttle-share-").tempdir()?;
    for (path, contents) in files {
        let target = temp.path().join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, contents)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    let store = LocalStore::new(temp.path())?;
    Ok((temp, store))
}
