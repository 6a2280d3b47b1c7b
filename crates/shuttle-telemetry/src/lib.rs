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

//! Logging and metrics for shuttle services.
//!
//! Layout: `init.rs` (subscriber installation), `metrics.rs` (Prometheus
//! registry and snapshots), `error.rs` (telemetry errors).

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging, installed_format};
pub use metrics::{ActiveTransferGuard, Metrics, MetricsSnapshot};
