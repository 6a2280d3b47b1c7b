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

//! Shared test helpers used across integration suites.
//! Layout: mocks.rs (in-memory share with fault injection), fixtures.rs (seeded shares).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{local_share, memory_share};
pub use mocks::{DEFAULT_PAGE_SIZE, Fault, FaultOp, MemoryNode, MemoryStore};
