//! Console configuration loaded from TOML.

use std::{fs, io, path::Path, path::PathBuf};

use serde::Deserialize;

/// Number of entries retained when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Keys that toggle the console when no hotkeys are configured.
pub const DEFAULT_HOTKEYS: [&str; 2] = ["`", "F12"];

/// Tunable console settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Maximum number of log entries retained.
    pub capacity: usize,
    /// Key names that toggle the console panel.
    pub hotkeys: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            hotkeys: DEFAULT_HOTKEYS.iter().map(|key| (*key).to_owned()).collect(),
        }
    }
}

impl ConsoleConfig {
    /// Parses a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.hotkeys.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::EmptyHotkey);
        }
        Ok(())
    }
}

/// Errors raised while loading console configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read console config at {}", path.display())]
    Read {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The configuration was not valid TOML for this schema.
    #[error("failed to parse console config")]
    Parse(#[from] toml::de::Error),
    /// The log capacity must retain at least one entry.
    #[error("console capacity must be at least 1")]
    InvalidCapacity,
    /// Hotkey names must not be blank.
    #[error("console hotkeys must not be blank")]
    EmptyHotkey,
}
