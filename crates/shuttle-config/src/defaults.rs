//! Default values and bounds for engine configuration.
//!
//! # Design
//! - Centralize defaults so the loader, validation and tests agree on one set of values.
//! - Keep size bounds explicit for auditability.

/// Chunk size used when the share does not report negotiated transfer limits.
pub const DEFAULT_FALLBACK_CHUNK_SIZE: usize = 64 * 1024;
/// Largest accepted fallback chunk size.
pub const MAX_FALLBACK_CHUNK_SIZE: usize = 16 * 1024 * 1024;
/// Upper bound on `name(n)` candidates probed before a rename conflict gives up.
pub const DEFAULT_MAX_RENAME_ATTEMPTS: u32 = 10_000;
/// Prefix of the staging name an overwritten destination is parked under.
pub const DEFAULT_TEMP_PREFIX: &str = "temp-";
/// Log level applied when neither configuration nor `RUST_LOG` provide one.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "SHUTTLE_";
