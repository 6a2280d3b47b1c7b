//! The client-side contract of a remote file share.
//!
//! Every call may block for the duration of the remote round-trip. Implementations
//! must be safe to share between threads; callers serialise their own operations.

use crate::error::StoreResult;
use crate::model::{
    AccessMode, Disposition, FileHandle, ListingPage, ReadOutcome, ShareMode, TransferLimits,
};
use crate::path::SharePath;

/// Operations a share client offers to the transfer engine.
pub trait RemoteStore: Send + Sync {
    /// Open (or create, per `disposition`) the entry at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` when `Disposition::Open` targets a missing entry, `AlreadyExists`
    /// when `Disposition::Create` targets an occupied path, or a transport error.
    fn open(
        &self,
        path: &SharePath,
        access: AccessMode,
        share: ShareMode,
        disposition: Disposition,
    ) -> StoreResult<FileHandle>;

    /// Read up to `length` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle is invalid, lacks read access, or the
    /// transport fails. End of file is reported as [`ReadOutcome::EndOfFile`].
    fn read(&self, handle: &FileHandle, offset: u64, length: usize) -> StoreResult<ReadOutcome>;

    /// Write `data` at `offset`, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle is invalid, lacks write access, or the
    /// transport fails.
    fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> StoreResult<usize>;

    /// Release the handle.
    fn close(&self, handle: FileHandle);

    /// Rename the opened entry to `new_path`.
    ///
    /// Directories move with their whole subtree in one call.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when `new_path` is occupied and `replace_if_exists` is false,
    /// `Unsupported` when the share cannot re-parent entries across directories.
    fn rename(
        &self,
        handle: &FileHandle,
        new_path: &SharePath,
        replace_if_exists: bool,
    ) -> StoreResult<()>;

    /// Mark the opened entry for deletion and close the handle.
    ///
    /// # Errors
    ///
    /// `DirectoryNotEmpty` for non-empty directories, or a transport error.
    fn delete(&self, handle: FileHandle) -> StoreResult<()>;

    /// Fetch the next page of a directory listing.
    ///
    /// Callers loop until [`ListingPage::End`]; pages may include `.` and `..`.
    ///
    /// # Errors
    ///
    /// `NotADirectory` for file handles, or a transport error.
    fn list_directory(&self, handle: &FileHandle) -> StoreResult<ListingPage>;

    /// Create `path` and any missing parents; an existing directory is success.
    ///
    /// # Errors
    ///
    /// `NotADirectory` when a segment is occupied by a file, or a transport error.
    fn create_directory(&self, path: &SharePath) -> StoreResult<()>;

    /// Negotiated per-request size limits, when the share reports them.
    fn transfer_limits(&self) -> Option<TransferLimits> {
        None
    }
}
