//! Session configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult, ValidationError};
use crate::observable::DEFAULT_FLUSH_THRESHOLD;

/// Configuration for a [`Session`](crate::Session).
///
/// Missing fields take their defaults when deserializing:
///
/// ```json
/// { "model_source": "models/tlbr.xml", "seed": 7, "output_dir": "out" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Model file; its name without directories prefixes the output files.
    pub model_source: PathBuf,
    /// Run seed embedded in output file names.
    pub seed: u32,
    /// Buffered samples that trigger an automatic flush.
    pub flush_threshold: usize,
    /// Directory receiving the gdat files.
    pub output_dir: PathBuf,
    /// Maximum compositions kept by the initialization cache (`None` = unbounded).
    pub cache_capacity: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_source: PathBuf::from("model.xml"),
            seed: 0,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            output_dir: PathBuf::from("."),
            cache_capacity: None,
        }
    }
}

impl SessionConfig {
    /// Configuration for `model_source` and `seed` with every other field at its default.
    #[must_use]
    pub fn new(model_source: impl Into<PathBuf>, seed: u32) -> Self {
        Self {
            model_source: model_source.into(),
            seed,
            ..Self::default()
        }
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the flush threshold.
    #[must_use]
    pub const fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    /// Sets the cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Loads a JSON configuration file and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::FileIo` if the file cannot be read and a
    /// validation error if it does not parse or fails [`validate`](Self::validate).
    pub fn from_json_file(path: impl AsRef<Path>) -> ConnectorResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConnectorError::file_io(path, e))?;
        Self::from_json_str(&text)
    }

    /// Parses a JSON configuration and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` on parse or validation failure.
    pub fn from_json_str(text: &str) -> ConnectorResult<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        Ok(cfg.validate()?)
    }

    /// Checks field ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for an empty model source, a zero
    /// flush threshold or a zero cache capacity.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.model_source.as_os_str().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "model_source must not be empty".to_string(),
            });
        }
        if self.flush_threshold == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "flush_threshold must be > 0".to_string(),
            });
        }
        if self.cache_capacity == Some(0) {
            return Err(ValidationError::InvalidConfig {
                reason: "cache_capacity must be > 0 when set".to_string(),
            });
        }
        Ok(self)
    }
}
