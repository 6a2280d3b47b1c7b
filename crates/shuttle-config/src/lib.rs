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

//! Layered configuration for the shuttle transfer engine.
//!
//! Layout: `model.rs` (typed config models), `defaults.rs` (default values and
//! bounds), `validate.rs` (validation/parsing helpers), `loader.rs`
//! (`ConfigLoader` merging defaults, a JSON document and environment overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use model::{EngineConfig, LogFormatSetting, ShuttleConfig, TelemetryConfig};
pub use validate::validate_config;
