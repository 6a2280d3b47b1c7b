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

//! Client-side interface to a shared remote filesystem.
//!
//! Layout: `path.rs` (share-relative paths), `model.rs` (handles, listing and IO
//! values), `store.rs` (the `RemoteStore` trait), `local.rs` (a share rooted in a
//! local directory), `error.rs` (store errors).

pub mod error;
pub mod local;
pub mod model;
pub mod path;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use local::{LISTING_PAGE_SIZE, LocalStore};
pub use model::{
    AccessMode, DirEntry, Disposition, EntryKind, FileHandle, ListingPage, ReadOutcome, ShareMode,
    TransferLimits,
};
pub use path::SharePath;
pub use store::RemoteStore;
