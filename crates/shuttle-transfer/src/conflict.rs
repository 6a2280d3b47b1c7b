//! Conflict resolution for destinations that already exist.
//!
//! # Design
//! - Existence is probed by an attempted open and reported as a tri-state, so the
//!   resolver branches on values instead of on store errors.
//! - Alternate names come from a pure function over a probe closure.
//! - Overwrites stage the existing entry under a temp name and record it in the
//!   ledger before any new byte is written.

use shuttle_store::{
    AccessMode, Disposition, EntryKind, RemoteStore, ShareMode, SharePath, StoreError,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::model::ConflictPolicy;

/// Outcome of an existence probe.
#[derive(Debug)]
pub enum Existence {
    /// An entry of the given kind occupies the path.
    Present(EntryKind),
    /// Nothing occupies the path.
    Absent,
    /// The probe itself failed.
    Failed(StoreError),
}

impl Existence {
    /// Turn the probe into a plain `Option`, surfacing probe failures as errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Store`] for [`Existence::Failed`].
    pub fn into_result(
        self,
        operation: &'static str,
        path: &SharePath,
    ) -> TransferResult<Option<EntryKind>> {
        match self {
            Self::Present(kind) => Ok(Some(kind)),
            Self::Absent => Ok(None),
            Self::Failed(source) => Err(TransferError::store(operation, path, source)),
        }
    }
}

/// Probe `path` by opening it for read and closing the handle again.
pub fn probe(store: &dyn RemoteStore, path: &SharePath) -> Existence {
    match store.open(path, AccessMode::Read, ShareMode::All, Disposition::Open) {
        Ok(handle) => {
            let kind = handle.kind();
            store.close(handle);
            Existence::Present(kind)
        }
        Err(StoreError::NotFound { .. }) => Existence::Absent,
        Err(err) => Existence::Failed(err),
    }
}

/// Lowest-numbered `name(n)` sibling of `path` for which `exists` returns false.
///
/// Files keep their extension (`old.txt` → `old(1).txt`); a leading dot does not
/// start an extension. Directories take the suffix at the end of the name.
///
/// # Errors
///
/// Returns [`TransferError::NameExhausted`] after `max_attempts` taken names, or
/// the first error reported by `exists`.
pub fn generate_unique_name<F>(
    path: &SharePath,
    kind: EntryKind,
    max_attempts: u32,
    mut exists: F,
) -> TransferResult<SharePath>
where
    F: FnMut(&SharePath) -> TransferResult<bool>,
{
    let name = path
        .file_name()
        .ok_or_else(|| TransferError::invalid_input("destination", "share_root", path.as_str()))?;
    let (stem, extension) = match kind {
        EntryKind::File => split_extension(name),
        EntryKind::Directory => (name, ""),
    };

    for attempt in 1..=max_attempts {
        let candidate = path
            .with_file_name(&format!("{stem}({attempt}){extension}"))
            .map_err(|source| TransferError::store("conflict.candidate", path, source))?;
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(TransferError::NameExhausted {
        path: path.clone(),
        attempts: max_attempts,
    })
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Sibling of `path` used to park an overwritten destination.
///
/// # Errors
///
/// Returns an error when `path` is the share root.
pub fn temp_name(path: &SharePath, prefix: &str) -> TransferResult<SharePath> {
    let name = path
        .file_name()
        .ok_or_else(|| TransferError::invalid_input("destination", "share_root", path.as_str()))?;
    path.with_file_name(&format!("{prefix}{}-{name}", Uuid::new_v4()))
        .map_err(|source| TransferError::store("conflict.temp_name", path, source))
}

/// What the executor should do for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The destination was free.
    Free(SharePath),
    /// The existing destination was staged; write to the same path.
    Replace(SharePath),
    /// The destination was taken; write to this alternate name.
    Alternate(SharePath),
    /// Source and destination are the same file; nothing to do.
    InPlace(SharePath),
}

impl Resolution {
    /// Effective destination.
    #[must_use]
    pub const fn path(&self) -> &SharePath {
        match self {
            Self::Free(path) | Self::Replace(path) | Self::Alternate(path) | Self::InPlace(path) => {
                path
            }
        }
    }

    /// Whether an existing entry occupied the destination.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        !matches!(self, Self::Free(_))
    }
}

/// Applies one conflict policy to every destination of an operation.
pub struct ConflictResolver<'a> {
    store: &'a dyn RemoteStore,
    policy: ConflictPolicy,
    temp_prefix: &'a str,
    max_attempts: u32,
}

impl<'a> ConflictResolver<'a> {
    /// Resolver bound to one store and policy.
    #[must_use]
    pub const fn new(
        store: &'a dyn RemoteStore,
        policy: ConflictPolicy,
        temp_prefix: &'a str,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            policy,
            temp_prefix,
            max_attempts,
        }
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Decide the effective destination of a file copied from `source`.
    ///
    /// An `Overwrite` stages the existing file and records `Renamed` in `ledger`
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DestinationExists`] under `Throw` (or when a directory
    /// occupies the destination under `Overwrite`), and store errors from probes
    /// and staging renames.
    pub fn resolve_file(
        &self,
        source: &SharePath,
        destination: &SharePath,
        ledger: &mut Ledger,
    ) -> TransferResult<Resolution> {
        let Some(existing) =
            probe(self.store, destination).into_result("conflict.probe", destination)?
        else {
            return Ok(Resolution::Free(destination.clone()));
        };

        info!(
            destination = %destination,
            policy = self.policy.as_str(),
            "destination already exists"
        );
        match self.policy {
            ConflictPolicy::Throw => Err(TransferError::DestinationExists {
                path: destination.clone(),
            }),
            ConflictPolicy::Overwrite if source == destination => {
                Ok(Resolution::InPlace(destination.clone()))
            }
            ConflictPolicy::Overwrite if existing == EntryKind::Directory => {
                Err(TransferError::DestinationExists {
                    path: destination.clone(),
                })
            }
            ConflictPolicy::Overwrite => {
                let temp = temp_name(destination, self.temp_prefix)?;
                self.stage(destination, &temp)?;
                ledger.record(LedgerEntry::Renamed {
                    temp,
                    original: destination.clone(),
                });
                Ok(Resolution::Replace(destination.clone()))
            }
            ConflictPolicy::Rename => {
                let alternate = self.alternate_name(destination, EntryKind::File)?;
                debug!(destination = %destination, alternate = %alternate, "using alternate name");
                Ok(Resolution::Alternate(alternate))
            }
        }
    }

    /// Lowest unused `name(n)` sibling of `path`, probing the store.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NameExhausted`] or probe failures.
    pub fn alternate_name(&self, path: &SharePath, kind: EntryKind) -> TransferResult<SharePath> {
        generate_unique_name(path, kind, self.max_attempts, |candidate| {
            probe(self.store, candidate)
                .into_result("conflict.probe_candidate", candidate)
                .map(|existing| existing.is_some())
        })
    }

    fn stage(&self, destination: &SharePath, temp: &SharePath) -> TransferResult<()> {
        let handle = self
            .store
            .open(destination, AccessMode::Delete, ShareMode::All, Disposition::Open)
            .map_err(|source| TransferError::store("conflict.open_existing", destination, source))?;
        let renamed = self.store.rename(&handle, temp, false);
        self.store.close(handle);
        renamed.map_err(|source| TransferError::store("conflict.stage", destination, source))?;
        debug!(destination = %destination, temp = %temp, "staged existing destination");
        Ok(())
    }
}
