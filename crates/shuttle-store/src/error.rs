//! # Design
//!
//! - Provide structured, constant-message errors for store operations.
//! - Capture the operation and share path so transport failures are reproducible in tests.
//! - Keep a distinct `NotFound` so callers can branch on absence without inspecting IO kinds.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by a remote file store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed entry does not exist.
    #[error("store entry not found")]
    NotFound {
        /// Share path that was addressed.
        path: String,
    },
    /// An entry already occupies the addressed path.
    #[error("store entry already exists")]
    AlreadyExists {
        /// Share path that was addressed.
        path: String,
    },
    /// A directory was required but a file was found.
    #[error("store entry is not a directory")]
    NotADirectory {
        /// Share path that was addressed.
        path: String,
    },
    /// A file was required but a directory was found.
    #[error("store entry is a directory")]
    IsADirectory {
        /// Share path that was addressed.
        path: String,
    },
    /// Directory deletion was attempted while it still had children.
    #[error("store directory not empty")]
    DirectoryNotEmpty {
        /// Share path that was addressed.
        path: String,
    },
    /// The handle was already closed or never issued by this store.
    #[error("store handle is not open")]
    InvalidHandle {
        /// Handle identifier.
        handle: u64,
    },
    /// The handle was not opened with the access the operation needs.
    #[error("store access denied")]
    AccessDenied {
        /// Operation that was rejected.
        operation: &'static str,
        /// Share path of the handle.
        path: String,
    },
    /// The path could not be parsed as a share-relative path.
    #[error("invalid store path")]
    InvalidPath {
        /// Offending input.
        path: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// The store cannot perform the requested operation.
    #[error("store operation unsupported")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Share path involved.
        path: String,
    },
    /// Transport or local IO failure.
    #[error("store io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Backing path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the error reports a missing entry.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the error reports an occupied path.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
