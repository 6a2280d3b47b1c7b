//! Layered configuration loading.
//!
//! # Design
//! - Layers apply in order: built-in defaults, an optional JSON document, then
//!   `SHUTTLE_*` environment overrides.
//! - Environment variables are injected as an iterator so callers and tests never
//!   mutate the process environment.
//! - The merged document is validated once, after every layer has been applied.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::defaults::ENV_PREFIX;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{LogFormatSetting, ShuttleConfig};
use crate::validate::{parse_u32, parse_usize, validate_config};

/// Builder that assembles a [`ShuttleConfig`] from its layers.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// Create a loader that reads only defaults and the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON document between the defaults and the environment layer.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Replace the process environment with an explicit set of variables.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Produce the merged and validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be read or decoded, when an
    /// override cannot be parsed, or when the merged values fail validation.
    pub fn load(&self) -> ConfigResult<ShuttleConfig> {
        let mut config = match &self.file {
            Some(path) => read_document(path)?,
            None => ShuttleConfig::default(),
        };

        match &self.env {
            Some(vars) => apply_env(
                &mut config,
                vars.iter().map(|(key, value)| (key.as_str(), value.as_str())),
            )?,
            None => {
                let vars: Vec<(String, String)> = std::env::vars().collect();
                apply_env(
                    &mut config,
                    vars.iter().map(|(key, value)| (key.as_str(), value.as_str())),
                )?;
            }
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn read_document(path: &Path) -> ConfigResult<ShuttleConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration document");
    Ok(config)
}

fn apply_env<'a>(
    config: &mut ShuttleConfig,
    vars: impl Iterator<Item = (&'a str, &'a str)>,
) -> ConfigResult<()> {
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match name {
            "FALLBACK_CHUNK_SIZE" => {
                config.engine.fallback_chunk_size =
                    parse_usize("engine", "fallback_chunk_size", value)?;
            }
            "MAX_RENAME_ATTEMPTS" => {
                config.engine.max_rename_attempts =
                    parse_u32("engine", "max_rename_attempts", value)?;
            }
            "TEMP_PREFIX" => config.engine.temp_prefix = value.to_string(),
            "LOG_LEVEL" => config.telemetry.log_level = value.trim().to_string(),
            "LOG_FORMAT" => config.telemetry.log_format = value.parse::<LogFormatSetting>()?,
            _ => {
                warn!(variable = key, "ignoring unknown configuration override");
                continue;
            }
        }
        debug!(variable = key, "applied configuration override");
    }
    Ok(())
}
