//! # Design
//!
//! - Provide structured, constant-message errors for the transfer pipeline.
//! - Capture operation context (share paths, fields, inputs) to make failures reproducible in tests.
//! - Keep the triggering error intact when compensation also fails.

use shuttle_store::{SharePath, StoreError};
use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors produced by the transfer engine.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Input validation failures; nothing was mutated.
    #[error("transfer invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The selection pattern did not compile.
    #[error("transfer invalid pattern")]
    Pattern {
        /// Pattern as supplied by the caller.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// The source is missing or selected no entries.
    #[error("transfer has nothing to transfer")]
    NothingToTransfer {
        /// Source path that was examined.
        path: SharePath,
        /// `source_missing` or `no_matches`.
        reason: &'static str,
    },
    /// A destination exists and the conflict policy is `Throw`.
    #[error("transfer destination already exists")]
    DestinationExists {
        /// Occupied destination path.
        path: SharePath,
    },
    /// Every candidate name for the rename policy was taken.
    #[error("transfer exhausted alternate names")]
    NameExhausted {
        /// Destination the names were derived from.
        path: SharePath,
        /// Number of candidates probed.
        attempts: u32,
    },
    /// The target directory does not exist and creation was not requested.
    #[error("transfer target directory missing")]
    TargetMissing {
        /// Missing directory.
        path: SharePath,
    },
    /// A store call failed.
    #[error("transfer store operation failed")]
    Store {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Share path involved in the failure.
        path: SharePath,
        /// Underlying store error.
        source: StoreError,
    },
    /// The share cannot perform an operation the engine requires.
    #[error("transfer operation unsupported by store")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Share path involved.
        path: SharePath,
    },
    /// The caller cancelled the operation.
    #[error("transfer cancelled")]
    Cancelled,
    /// The operation failed and at least one compensation failed too.
    #[error("transfer rollback incomplete")]
    RollbackIncomplete {
        /// Error that triggered the rollback.
        source: Box<TransferError>,
        /// First compensation failure.
        rollback: Box<TransferError>,
    },
    /// Destinations are final but staged temp entries could not all be removed.
    #[error("transfer commit incomplete")]
    CommitIncomplete {
        /// Temp entries left behind.
        pending: usize,
        /// First deletion failure.
        source: Box<TransferError>,
    },
    /// Destinations are final but some move sources could not be removed.
    #[error("transfer source cleanup incomplete")]
    SourceCleanup {
        /// Sources left behind.
        pending: usize,
        /// First deletion failure.
        source: Box<TransferError>,
    },
}

impl TransferError {
    pub(crate) fn store(operation: &'static str, path: &SharePath, source: StoreError) -> Self {
        match source {
            StoreError::Unsupported { .. } => Self::Unsupported {
                operation,
                path: path.clone(),
            },
            source => Self::Store {
                operation,
                path: path.clone(),
                source,
            },
        }
    }

    pub(crate) fn invalid_input(
        field: &'static str,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: Some(value.into()),
        }
    }

    /// Whether the error carries a cancellation, directly or as a rollback trigger.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RollbackIncomplete { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
