//! Record of destination-side mutations and their compensations.
//!
//! # Design
//! - One ledger per operation, owned by the calling frame and passed by `&mut`.
//! - `commit` and `rollback` drain the ledger; both attempt every action and
//!   report the first failure.
//! - Rollback runs in reverse order so later effects are undone before the
//!   effects they depend on (a file before its directory, a new file before the
//!   staged original it displaced).

use shuttle_store::{AccessMode, Disposition, RemoteStore, ShareMode, SharePath, StoreError};
use tracing::{debug, warn};

use crate::error::{TransferError, TransferResult};

/// One destination-side mutation that is not final yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// A new destination file.
    Created(SharePath),
    /// A pre-existing destination parked under a temp name.
    Renamed {
        /// Staging name holding the original content.
        temp: SharePath,
        /// Path the content came from.
        original: SharePath,
    },
    /// A directory the operation created.
    DirectoryCreated(SharePath),
}

/// Append-only list of [`LedgerEntry`] values.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an effect.
    pub fn record(&mut self, entry: LedgerEntry) {
        debug!(entry = ?entry, "ledger record");
        self.entries.push(entry);
    }

    /// Effects recorded so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of pending effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make every effect final by deleting staged temp entries.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::CommitIncomplete`] when any temp entry could not be
    /// deleted; destinations are final either way.
    pub fn commit(&mut self, store: &dyn RemoteStore) -> TransferResult<()> {
        let mut first_failure = None;
        let mut pending = 0;
        for entry in std::mem::take(&mut self.entries) {
            let LedgerEntry::Renamed { temp, .. } = entry else {
                continue;
            };
            if let Err(err) = delete_entry(store, &temp, "ledger.commit_delete") {
                warn!(temp = %temp, error = %err, "failed to remove staged destination");
                pending += 1;
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            None => Ok(()),
            Some(err) => Err(TransferError::CommitIncomplete {
                pending,
                source: Box::new(err),
            }),
        }
    }

    /// Undo every effect, newest first.
    ///
    /// # Errors
    ///
    /// Returns the first compensation failure after all compensations were attempted.
    pub fn rollback(&mut self, store: &dyn RemoteStore) -> TransferResult<()> {
        let mut first_failure = None;
        while let Some(entry) = self.entries.pop() {
            let result = match &entry {
                LedgerEntry::Created(path) => {
                    forgive_missing(delete_entry(store, path, "ledger.rollback_delete"))
                }
                LedgerEntry::Renamed { temp, original } => restore(store, temp, original),
                LedgerEntry::DirectoryCreated(path) => {
                    forgive_missing(delete_entry(store, path, "ledger.rollback_rmdir"))
                }
            };
            if let Err(err) = result {
                warn!(entry = ?entry, error = %err, "compensation failed");
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

pub(crate) fn delete_entry(
    store: &dyn RemoteStore,
    path: &SharePath,
    operation: &'static str,
) -> TransferResult<()> {
    let handle = store
        .open(path, AccessMode::Delete, ShareMode::All, Disposition::Open)
        .map_err(|source| TransferError::store(operation, path, source))?;
    store
        .delete(handle)
        .map_err(|source| TransferError::store(operation, path, source))
}

fn restore(store: &dyn RemoteStore, temp: &SharePath, original: &SharePath) -> TransferResult<()> {
    let handle = store
        .open(temp, AccessMode::Delete, ShareMode::All, Disposition::Open)
        .map_err(|source| TransferError::store("ledger.rollback_open_temp", temp, source))?;
    let renamed = store.rename(&handle, original, true);
    store.close(handle);
    renamed.map_err(|source| TransferError::store("ledger.rollback_restore", original, source))
}

fn forgive_missing(result: TransferResult<()>) -> TransferResult<()> {
    match result {
        Err(TransferError::Store {
            source: StoreError::NotFound { .. },
            path,
            ..
        }) => {
            debug!(path = %path, "compensation target already gone");
            Ok(())
        }
        other => other,
    }
}
