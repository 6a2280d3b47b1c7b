//! Validation helpers and parsing utilities for configuration documents.

use crate::defaults::MAX_FALLBACK_CHUNK_SIZE;
use crate::error::{ConfigError, ConfigResult};
use crate::model::ShuttleConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a fully merged configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field out of range.
pub fn validate_config(config: &ShuttleConfig) -> ConfigResult<()> {
    let engine = &config.engine;
    if engine.fallback_chunk_size == 0 || engine.fallback_chunk_size > MAX_FALLBACK_CHUNK_SIZE {
        return Err(ConfigError::InvalidField {
            section: "engine",
            field: "fallback_chunk_size",
            value: Some(engine.fallback_chunk_size.to_string()),
            reason: "out_of_range",
        });
    }
    if engine.max_rename_attempts == 0 {
        return Err(ConfigError::InvalidField {
            section: "engine",
            field: "max_rename_attempts",
            value: Some(engine.max_rename_attempts.to_string()),
            reason: "must_be_positive",
        });
    }
    validate_temp_prefix(&engine.temp_prefix)?;

    let level = config.telemetry.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::InvalidField {
            section: "telemetry",
            field: "log_level",
            value: Some(config.telemetry.log_level.clone()),
            reason: "unknown_level",
        });
    }
    Ok(())
}

fn validate_temp_prefix(prefix: &str) -> ConfigResult<()> {
    let reason = if prefix.trim().is_empty() {
        Some("empty")
    } else if prefix.contains(['/', '\\', '\0']) {
        Some("contains_separator")
    } else {
        None
    };
    reason.map_or(Ok(()), |reason| {
        Err(ConfigError::InvalidField {
            section: "engine",
            field: "temp_prefix",
            value: Some(prefix.to_string()),
            reason,
        })
    })
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_usize(
    section: &'static str,
    field: &'static str,
    raw: &str,
) -> ConfigResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "not_an_integer",
        })
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_u32(section: &'static str, field: &'static str, raw: &str) -> ConfigResult<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "not_an_integer",
        })
}
