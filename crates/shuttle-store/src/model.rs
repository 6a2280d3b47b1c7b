//! Value types exchanged with a remote file store.
//!
//! # Design
//! - Mirror the primitives a share client exposes (access, sharing, disposition).
//! - Handles are opaque tokens; the store keeps the state behind them.

use crate::path::SharePath;

/// Access requested when opening an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read file contents or list a directory.
    Read,
    /// Write file contents.
    Write,
    /// Rename or delete the entry.
    Delete,
}

/// Sharing granted to other openers while the handle is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// No concurrent access.
    Exclusive,
    /// Concurrent readers allowed.
    Read,
    /// Concurrent readers, writers and deleters allowed.
    All,
}

/// What to do depending on whether the entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Open an existing entry; fail when absent.
    Open,
    /// Create a new file; fail when the path is occupied.
    Create,
    /// Open when present, otherwise create an empty file.
    OpenOrCreate,
}

/// Kind of entry behind a handle or listing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Opaque handle issued by [`crate::RemoteStore::open`].
///
/// Handles are deliberately not `Clone`: `close` and `delete` consume them.
#[derive(Debug, PartialEq, Eq)]
pub struct FileHandle {
    id: u64,
    path: SharePath,
    kind: EntryKind,
    access: AccessMode,
}

impl FileHandle {
    /// Build a handle; only store implementations should call this.
    #[must_use]
    pub const fn new(id: u64, path: SharePath, kind: EntryKind, access: AccessMode) -> Self {
        Self {
            id,
            path,
            kind,
            access,
        }
    }

    /// Store-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Path the handle was opened with.
    #[must_use]
    pub const fn path(&self) -> &SharePath {
        &self.path
    }

    /// Kind of the opened entry.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Access the handle was opened with.
    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// Whether the handle refers to a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// One record of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (may be `.` or `..`; callers filter those).
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// File size in bytes, zero for directories.
    pub size: u64,
}

impl DirEntry {
    /// Whether the record is one of the `.`/`..` pseudo entries.
    #[must_use]
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Result of one `list_directory` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingPage {
    /// Next batch of records.
    Entries(Vec<DirEntry>),
    /// The listing is exhausted.
    End,
}

/// Result of one `read` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes read at the requested offset; may be shorter than requested.
    Data(Vec<u8>),
    /// The offset is at or past the end of the file.
    EndOfFile,
}

/// Per-request size limits negotiated with the share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Largest read the share accepts.
    pub max_read: usize,
    /// Largest write the share accepts.
    pub max_write: usize,
}

impl TransferLimits {
    /// Chunk size usable for both reading and writing, `None` when either limit is zero.
    #[must_use]
    pub fn chunk_size(self) -> Option<usize> {
        let size = self.max_read.min(self.max_write);
        (size > 0).then_some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_limits_pick_the_smaller_endpoint() {
        let limits = TransferLimits {
            max_read: 1_048_576,
            max_write: 65_536,
        };
        assert_eq!(limits.chunk_size(), Some(65_536));

        let unusable = TransferLimits {
            max_read: 0,
            max_write: 65_536,
        };
        assert_eq!(unusable.chunk_size(), None);
    }

    #[test]
    fn dir_entry_flags_dot_records() {
        let dot = DirEntry {
            name: "..".to_string(),
            kind: EntryKind::Directory,
            size: 0,
        };
        let file = DirEntry {
            name: "a.txt".to_string(),
            kind: EntryKind::File,
            size: 3,
        };
        assert!(dot.is_dot_entry());
        assert!(!file.is_dot_entry());
    }
}
