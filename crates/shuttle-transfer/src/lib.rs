#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    unreachable_pub,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Transactional bulk copy and move of files on a remote share.
//!
//! A bulk operation enumerates the selected files, maps each onto the target tree,
//! resolves conflicts per policy, copies the bytes and records every destination-side
//! effect in a [`Ledger`]. Success commits the ledger; any failure rolls it back so
//! the destination returns to its prior state.
//!
//! Layout: `model/` (requests and per-entry values), `pattern.rs` (selection),
//! `enumerate.rs` (lazy source walk), `destination.rs` (target mapping and directory
//! creation), `conflict.rs` (existence probes and policies), `executor.rs` (byte
//! copies and renames), `ledger.rs` (commit/rollback), `directory.rs` (directory
//! moves), `service.rs` (the step pipeline), `error.rs` (transfer errors).

pub mod conflict;
pub mod destination;
pub mod directory;
pub mod enumerate;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod model;
pub mod pattern;
pub mod service;

pub use conflict::{ConflictResolver, Existence, Resolution, generate_unique_name, probe};
pub use destination::{DirectoryPreparer, resolve_destination};
pub use directory::{DirectoryMoveOutcome, DirectoryMover, remove_tree};
pub use enumerate::EntryEnumerator;
pub use error::{TransferError, TransferResult};
pub use executor::TransferExecutor;
pub use ledger::{Ledger, LedgerEntry};
pub use model::{
    ConflictPolicy, DirectoryMoveRequest, FileItem, PatternMode, SourceEntry, TransferMode,
    TransferPlan, TransferRequest,
};
pub use pattern::NameMatcher;
pub use service::TransferService;
pub use tokio_util::sync::CancellationToken;
