//! Session configuration, stored as a RON file.
//!
//! One file describes everything a capture session needs: the needle
//! geometry, the control-loop rate, the recording batch size, and where
//! the output files go.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::reconstructor::NeedleGeometry;

/// Everything the demo binary and the recording session read at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedleConfig {
    /// Physical and sampling parameters of the needle.
    pub geometry: NeedleGeometry,
    /// Control-loop rate in ticks per second.
    pub update_rate_hz: f64,
    /// Rows batched per writer hand-off.
    pub flush_period: usize,
    /// Directory that per-subject folders are created under.
    pub output_dir: PathBuf,
    /// Subject identifier; names the output folder.
    pub subject: String,
}

impl Default for NeedleConfig {
    fn default() -> Self {
        NeedleConfig {
            geometry: NeedleGeometry::default(),
            update_rate_hz: 50.0,
            flush_period: crate::recorder::DEFAULT_FLUSH_PERIOD,
            output_dir: PathBuf::from("data"),
            subject: "subject_0".to_owned(),
        }
    }
}

/// A nice little error that we can return if things go wrong while
/// reading or writing a [`NeedleConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when io fails when reading or writing the file.
    IoError(std::io::Error),
    /// Returned when serialization of the config fails.
    RonError(ron::Error),
    /// Returned when deserialization of the config fails.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::IoError(error) => Cow::from(format!("io error: {}", error)),
            CE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            CE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl NeedleConfig {
    /// Writes the config to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)?;
        fs::write(path, text).map_err(ConfigError::IoError)
    }

    /// Reads a config from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::IoError)?;
        ron::de::from_str(&text).map_err(ConfigError::RonSpannedError)
    }
}
