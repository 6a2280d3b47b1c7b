//! Mapping of source entries onto the target tree.

use std::collections::HashSet;

use shuttle_store::{EntryKind, RemoteStore, SharePath, StoreError};
use tracing::debug;

use crate::conflict::probe;
use crate::error::{TransferError, TransferResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::model::SourceEntry;

/// Naive destination of `source` below `target_root`.
///
/// Flattened destinations keep only the file name; preserved destinations keep
/// the path below the source root. Two entries may map to the same destination;
/// that is a conflict for the resolver, not an error here.
///
/// # Errors
///
/// Returns an error when a flattened entry has no file name.
pub fn resolve_destination(
    source: &SourceEntry,
    target_root: &SharePath,
    preserve_structure: bool,
) -> TransferResult<SharePath> {
    if preserve_structure {
        return Ok(target_root.join(&source.root_relative_path));
    }
    let name = source.absolute_path.file_name().ok_or_else(|| {
        TransferError::invalid_input("source_root", "share_root", source.absolute_path.as_str())
    })?;
    target_root
        .join_name(name)
        .map_err(|err| TransferError::store("destination.resolve", &source.absolute_path, err))
}

/// Creates missing destination directories one segment at a time and records
/// each one in the ledger.
pub struct DirectoryPreparer<'a> {
    store: &'a dyn RemoteStore,
    known: HashSet<SharePath>,
}

impl<'a> DirectoryPreparer<'a> {
    /// Preparer with no known directories besides the share root.
    #[must_use]
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self {
            store,
            known: HashSet::new(),
        }
    }

    /// Remember that `directory` and its ancestors exist.
    pub fn mark_existing(&mut self, directory: &SharePath) {
        self.known.extend(directory.prefixes());
    }

    /// Kind of the entry at `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns probe failures.
    pub fn inspect(&self, path: &SharePath) -> TransferResult<Option<EntryKind>> {
        if path.is_root() || self.known.contains(path) {
            return Ok(Some(EntryKind::Directory));
        }
        probe(self.store, path).into_result("destination.probe", path)
    }

    /// Make sure `directory` exists, creating missing segments.
    ///
    /// # Errors
    ///
    /// Returns a store error when a segment is occupied by a file or cannot be
    /// created.
    pub fn ensure(&mut self, directory: &SharePath, ledger: &mut Ledger) -> TransferResult<()> {
        if directory.is_root() || self.known.contains(directory) {
            return Ok(());
        }
        for segment in directory.prefixes() {
            if self.known.contains(&segment) {
                continue;
            }
            match probe(self.store, &segment).into_result("destination.probe", &segment)? {
                Some(EntryKind::Directory) => {}
                Some(EntryKind::File) => {
                    return Err(TransferError::store(
                        "destination.ensure_directory",
                        &segment,
                        StoreError::NotADirectory {
                            path: segment.as_str().to_string(),
                        },
                    ));
                }
                None => {
                    self.store.create_directory(&segment).map_err(|source| {
                        TransferError::store("destination.create_directory", &segment, source)
                    })?;
                    debug!(directory = %segment, "created directory");
                    ledger.record(LedgerEntry::DirectoryCreated(segment.clone()));
                }
            }
            self.known.insert(segment);
        }
        Ok(())
    }
}
