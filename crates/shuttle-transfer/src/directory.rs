//! Whole-directory relocation.
//!
//! # Design
//! - The move itself is one rename of the opened source directory; shares that
//!   cannot re-parent entries fail with `Unsupported`.
//! - Parents created for the target are ledgered and undone on failure.
//! - `Overwrite` removes the existing target tree before the rename. That removal
//!   is immediate and cannot be rolled back.

use shuttle_config::EngineConfig;
use shuttle_store::{EntryKind, RemoteStore, SharePath, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conflict::{ConflictResolver, probe};
use crate::destination::DirectoryPreparer;
use crate::enumerate::list_all;
use crate::error::{TransferError, TransferResult};
use crate::executor::TransferExecutor;
use crate::ledger::{Ledger, delete_entry};
use crate::model::{ConflictPolicy, FileItem};

/// Result of a directory move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMoveOutcome {
    /// Source and effective target.
    pub item: FileItem,
    /// Whether the requested target was occupied.
    pub conflict: bool,
}

/// Moves one directory to a new path on the same share.
pub struct DirectoryMover<'a> {
    store: &'a dyn RemoteStore,
    resolver: ConflictResolver<'a>,
    executor: TransferExecutor<'a>,
}

impl<'a> DirectoryMover<'a> {
    /// Mover applying `policy` to an occupied target.
    #[must_use]
    pub fn new(store: &'a dyn RemoteStore, policy: ConflictPolicy, config: &'a EngineConfig) -> Self {
        Self {
            store,
            resolver: ConflictResolver::new(
                store,
                policy,
                &config.temp_prefix,
                config.max_rename_attempts,
            ),
            executor: TransferExecutor::new(store, config.fallback_chunk_size),
        }
    }

    /// Relocate `source` to `target`.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NothingToTransfer`] when the source is missing.
    /// - [`TransferError::InvalidInput`] when the source is a file.
    /// - [`TransferError::TargetMissing`] when the parent is missing and
    ///   `create_parents` is false.
    /// - [`TransferError::DestinationExists`] under `Throw`.
    /// - [`TransferError::Unsupported`], [`TransferError::Cancelled`] and store errors.
    pub fn run(
        &self,
        source: &SharePath,
        target: &SharePath,
        create_parents: bool,
        ledger: &mut Ledger,
        cancel: &CancellationToken,
    ) -> TransferResult<DirectoryMoveOutcome> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        match probe(self.store, source).into_result("directory.probe_source", source)? {
            None => {
                return Err(TransferError::NothingToTransfer {
                    path: source.clone(),
                    reason: "source_missing",
                });
            }
            Some(EntryKind::File) => {
                return Err(TransferError::invalid_input(
                    "source_path",
                    "not_a_directory",
                    source.as_str(),
                ));
            }
            Some(EntryKind::Directory) => {}
        }

        self.prepare_parent(target, create_parents, ledger)?;

        let existing = probe(self.store, target).into_result("directory.probe_target", target)?;
        let effective = match existing {
            None => target.clone(),
            Some(kind) => self.resolve_conflict(target, kind)?,
        };

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        self.executor.rename_entry(source, &effective, cancel)?;
        info!(source = %source, target = %effective, "moved directory");

        Ok(DirectoryMoveOutcome {
            item: FileItem {
                source_path: source.clone(),
                target_path: effective,
            },
            conflict: existing.is_some(),
        })
    }

    fn prepare_parent(
        &self,
        target: &SharePath,
        create_parents: bool,
        ledger: &mut Ledger,
    ) -> TransferResult<()> {
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        let mut preparer = DirectoryPreparer::new(self.store);
        match preparer.inspect(&parent)? {
            Some(EntryKind::Directory) => Ok(()),
            Some(EntryKind::File) => Err(TransferError::store(
                "directory.prepare_parent",
                &parent,
                StoreError::NotADirectory {
                    path: parent.as_str().to_string(),
                },
            )),
            None if create_parents => preparer.ensure(&parent, ledger),
            None => Err(TransferError::TargetMissing { path: parent }),
        }
    }

    fn resolve_conflict(&self, target: &SharePath, existing: EntryKind) -> TransferResult<SharePath> {
        info!(
            target = %target,
            policy = self.resolver.policy().as_str(),
            "directory target already exists"
        );
        match self.resolver.policy() {
            ConflictPolicy::Throw => Err(TransferError::DestinationExists {
                path: target.clone(),
            }),
            ConflictPolicy::Overwrite => {
                match existing {
                    EntryKind::Directory => remove_tree(self.store, target)?,
                    EntryKind::File => delete_entry(self.store, target, "directory.remove_target")?,
                }
                warn!(target = %target, "removed existing target before move");
                Ok(target.clone())
            }
            ConflictPolicy::Rename => self.resolver.alternate_name(target, EntryKind::Directory),
        }
    }
}

/// Delete `directory` and everything below it, deepest entries first.
///
/// # Errors
///
/// Returns the first store error; entries deleted before it stay deleted.
pub fn remove_tree(store: &dyn RemoteStore, directory: &SharePath) -> TransferResult<()> {
    let mut records = list_all(store, directory)?;
    records.retain(|record| !record.is_dot_entry());
    for record in records {
        let child = directory
            .join_name(&record.name)
            .map_err(|source| TransferError::store("directory.remove_tree", directory, source))?;
        match record.kind {
            EntryKind::Directory => remove_tree(store, &child)?,
            EntryKind::File => delete_entry(store, &child, "directory.remove_file")?,
        }
    }
    delete_entry(store, directory, "directory.remove_directory")?;
    debug!(directory = %directory, "removed directory tree");
    Ok(())
}
