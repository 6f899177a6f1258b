use std::{fs, path::Path};

use anyhow::{Context, Result};
use sandmod_system_console::ConsoleConfig;
use sandmod_system_souls::SoulTuning;
use serde::Deserialize;

/// Settings file with one table per mod.
///
/// ```toml
/// [console]
/// capacity = 200
///
/// [souls]
/// release_chance = 0.01
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AppConfig {
    pub(crate) console: ConsoleConfig,
    pub(crate) souls: SoulTuning,
}

impl AppConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse configuration")?;
        config.console.validate()?;
        config.souls.validate()?;
        Ok(config)
    }
}
