//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers used by the loader and the transfer engine.
//! - Every section deserialises with defaults so partial documents are valid.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_FALLBACK_CHUNK_SIZE, DEFAULT_LOG_LEVEL, DEFAULT_MAX_RENAME_ATTEMPTS,
    DEFAULT_TEMP_PREFIX,
};
use crate::error::ConfigError;

/// Complete configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShuttleConfig {
    /// Transfer engine tuning.
    pub engine: EngineConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
}

/// Tuning knobs for the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Chunk size used when the share reports no transfer limits.
    pub fallback_chunk_size: usize,
    /// Maximum `name(n)` candidates tried by the rename conflict policy.
    pub max_rename_attempts: u32,
    /// Prefix for the staging name of an overwritten destination.
    pub temp_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_chunk_size: DEFAULT_FALLBACK_CHUNK_SIZE,
            max_rename_attempts: DEFAULT_MAX_RENAME_ATTEMPTS,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Level directive (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,
    /// Output format.
    pub log_format: LogFormatSetting,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormatSetting::Auto,
        }
    }
}

/// Requested log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Pretty in debug builds, JSON in release builds.
    #[default]
    Auto,
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

impl LogFormatSetting {
    #[must_use]
    /// Render the setting as its lowercase string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormatSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_and_formats() {
        assert_eq!("json".parse::<LogFormatSetting>().ok(), Some(LogFormatSetting::Json));
        assert_eq!(" Pretty ".parse::<LogFormatSetting>().ok(), Some(LogFormatSetting::Pretty));
        assert!("xml".parse::<LogFormatSetting>().is_err());
        assert_eq!(LogFormatSetting::Auto.as_str(), "auto");
    }

    #[test]
    fn partial_documents_fall_back_to_defaults() -> Result<(), serde_json::Error> {
        let config: ShuttleConfig =
            serde_json::from_str(r#"{ "engine": { "max_rename_attempts": 5 } }"#)?;
        assert_eq!(config.engine.max_rename_attempts, 5);
        assert_eq!(config.engine.fallback_chunk_size, DEFAULT_FALLBACK_CHUNK_SIZE);
        assert_eq!(config.engine.temp_prefix, DEFAULT_TEMP_PREFIX);
        assert_eq!(config.telemetry, TelemetryConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<ShuttleConfig>(r#"{ "engine": { "chunk": 1 } }"#);
        assert!(parsed.is_err());
    }
}
