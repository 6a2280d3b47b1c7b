//! Byte movement between share entries.
//!
//! # Design
//! - Files are copied in chunks at explicit offsets; short writes are continued.
//! - A failed or cancelled copy closes its handles and deletes the partial
//!   destination before the error leaves this module.
//! - Directory moves are a single rename; there is no copy fallback.

use std::io;

use shuttle_store::{
    AccessMode, Disposition, FileHandle, ReadOutcome, RemoteStore, ShareMode, SharePath,
    StoreError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{TransferError, TransferResult};
use crate::ledger::delete_entry;

/// Chunk size for a store: its negotiated limits when present, else `fallback`.
#[must_use]
pub fn chunk_size(store: &dyn RemoteStore, fallback: usize) -> usize {
    store
        .transfer_limits()
        .and_then(shuttle_store::TransferLimits::chunk_size)
        .unwrap_or(fallback)
        .max(1)
}

/// Copies file contents and relocates directories on one store.
pub struct TransferExecutor<'a> {
    store: &'a dyn RemoteStore,
    chunk_size: usize,
}

impl<'a> TransferExecutor<'a> {
    /// Executor using the store's negotiated chunk size or `fallback_chunk_size`.
    #[must_use]
    pub fn new(store: &'a dyn RemoteStore, fallback_chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size(store, fallback_chunk_size),
        }
    }

    /// Chunk size in effect.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy `source` into a new file at `destination`, returning the bytes copied.
    ///
    /// # Errors
    ///
    /// Returns store errors from any call, or [`TransferError::Cancelled`]. When the
    /// partial destination cannot be removed the error is wrapped in
    /// [`TransferError::RollbackIncomplete`].
    pub fn copy_file(
        &self,
        source: &SharePath,
        destination: &SharePath,
        cancel: &CancellationToken,
    ) -> TransferResult<u64> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let reader = self
            .store
            .open(source, AccessMode::Read, ShareMode::Read, Disposition::Open)
            .map_err(|err| TransferError::store("executor.open_source", source, err))?;
        let writer = match self.store.open(
            destination,
            AccessMode::Write,
            ShareMode::Exclusive,
            Disposition::Create,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.store.close(reader);
                return Err(TransferError::store(
                    "executor.create_destination",
                    destination,
                    err,
                ));
            }
        };

        let copied = self.pump(&reader, &writer, source, destination, cancel);
        self.store.close(reader);
        self.store.close(writer);

        match copied {
            Ok(bytes) => {
                debug!(source = %source, destination = %destination, bytes, "copied file");
                Ok(bytes)
            }
            Err(err) => Err(self.discard_partial(destination, err)),
        }
    }

    fn pump(
        &self,
        reader: &FileHandle,
        writer: &FileHandle,
        source: &SharePath,
        destination: &SharePath,
        cancel: &CancellationToken,
    ) -> TransferResult<u64> {
        let mut offset = 0_u64;
        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            let chunk = match self
                .store
                .read(reader, offset, self.chunk_size)
                .map_err(|err| TransferError::store("executor.read", source, err))?
            {
                ReadOutcome::Data(bytes) if !bytes.is_empty() => bytes,
                ReadOutcome::Data(_) | ReadOutcome::EndOfFile => return Ok(offset),
            };

            let mut written = 0;
            while written < chunk.len() {
                let accepted = self
                    .store
                    .write(writer, offset + written as u64, &chunk[written..])
                    .map_err(|err| TransferError::store("executor.write", destination, err))?;
                if accepted == 0 {
                    return Err(TransferError::store(
                        "executor.write",
                        destination,
                        StoreError::Io {
                            operation: "write",
                            path: destination.as_str().into(),
                            source: io::Error::from(io::ErrorKind::WriteZero),
                        },
                    ));
                }
                written += accepted;
            }
            offset += chunk.len() as u64;
        }
    }

    fn discard_partial(&self, destination: &SharePath, err: TransferError) -> TransferError {
        match delete_entry(self.store, destination, "executor.discard_partial") {
            Ok(()) => {
                debug!(destination = %destination, "removed partial destination");
                err
            }
            Err(cleanup) => {
                warn!(
                    destination = %destination,
                    error = %cleanup,
                    "failed to remove partial destination"
                );
                TransferError::RollbackIncomplete {
                    source: Box::new(err),
                    rollback: Box::new(cleanup),
                }
            }
        }
    }

    /// Relocate the entry at `source` to `target` with one rename.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Unsupported`] when the share cannot re-parent
    /// entries, [`TransferError::Cancelled`], or store errors.
    pub fn rename_entry(
        &self,
        source: &SharePath,
        target: &SharePath,
        cancel: &CancellationToken,
    ) -> TransferResult<()> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let handle = self
            .store
            .open(source, AccessMode::Delete, ShareMode::All, Disposition::Open)
            .map_err(|err| TransferError::store("executor.open_for_rename", source, err))?;
        let renamed = self.store.rename(&handle, target, false);
        self.store.close(handle);
        renamed.map_err(|err| TransferError::store("executor.rename", target, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shuttle_store::TransferLimits;
    use shuttle_test_support::{Fault, FaultOp, MemoryStore};

    type TestResult<T> = anyhow::Result<T>;

    fn path(raw: &str) -> TestResult<SharePath> {
        Ok(SharePath::parse(raw)?)
    }

    #[test]
    fn chunk_size_prefers_negotiated_limits() {
        let plain = MemoryStore::new();
        assert_eq!(chunk_size(&plain, 65_536), 65_536);

        let limited = MemoryStore::new().with_limits(TransferLimits {
            max_read: 8,
            max_write: 5,
        });
        assert_eq!(chunk_size(&limited, 65_536), 5);
    }

    #[test]
    fn copy_spans_chunks_and_short_writes() -> TestResult<()> {
        let store = MemoryStore::new()
            .with_limits(TransferLimits {
                max_read: 4,
                max_write: 4,
            })
            .with_write_cap(3);
        store.add_file("src/data.bin", b"0123456789abcdef")?;
        store.add_dir("dst")?;

        let executor = TransferExecutor::new(&store, 65_536);
        let copied = executor.copy_file(
            &path("src/data.bin")?,
            &path("dst/data.bin")?,
            &CancellationToken::new(),
        )?;

        assert_eq!(copied, 16);
        assert_eq!(store.read_file("dst/data.bin"), Some(b"0123456789abcdef".to_vec()));
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[test]
    fn empty_files_are_copied() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("src/empty", b"")?;
        store.add_dir("dst")?;

        let executor = TransferExecutor::new(&store, 16);
        let copied =
            executor.copy_file(&path("src/empty")?, &path("dst/empty")?, &CancellationToken::new())?;
        assert_eq!(copied, 0);
        assert_eq!(store.read_file("dst/empty"), Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn write_failure_removes_partial_destination() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("src/data.bin", b"0123456789")?;
        store.add_dir("dst")?;
        store.inject(Fault::new(FaultOp::Write, "dst/data.bin")?.after(1));

        let executor = TransferExecutor::new(&store, 4);
        let result = executor.copy_file(
            &path("src/data.bin")?,
            &path("dst/data.bin")?,
            &CancellationToken::new(),
        );

        assert!(matches!(
            result,
            Err(TransferError::Store {
                operation: "executor.write",
                ..
            })
        ));
        assert!(!store.exists("dst/data.bin"));
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[test]
    fn failed_cleanup_is_reported_with_the_trigger() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("src/data.bin", b"0123456789")?;
        store.add_dir("dst")?;
        store.inject(Fault::new(FaultOp::Read, "src/data.bin")?.after(1));
        store.inject(Fault::new(FaultOp::Delete, "dst/data.bin")?);

        let executor = TransferExecutor::new(&store, 4);
        let result = executor.copy_file(
            &path("src/data.bin")?,
            &path("dst/data.bin")?,
            &CancellationToken::new(),
        );

        match result {
            Err(TransferError::RollbackIncomplete { source, .. }) => assert!(matches!(
                *source,
                TransferError::Store {
                    operation: "executor.read",
                    ..
                }
            )),
            other => anyhow::bail!("expected rollback incomplete, got {other:?}"),
        }
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[test]
    fn cancelled_copy_leaves_nothing_behind() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("src/a.txt", b"a")?;
        store.add_dir("dst")?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let executor = TransferExecutor::new(&store, 4);
        let result = executor.copy_file(&path("src/a.txt")?, &path("dst/a.txt")?, &cancel);
        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(!store.exists("dst/a.txt"));
        Ok(())
    }

    #[test]
    fn rename_surfaces_unsupported() -> TestResult<()> {
        let store = MemoryStore::new().without_cross_directory_rename();
        store.add_file("src/dir/a.txt", b"a")?;
        store.add_dir("dst")?;

        let executor = TransferExecutor::new(&store, 4);
        let result =
            executor.rename_entry(&path("src/dir")?, &path("dst/dir")?, &CancellationToken::new());
        assert!(matches!(result, Err(TransferError::Unsupported { .. })));
        assert!(store.exists("src/dir/a.txt"));
        Ok(())
    }
}
