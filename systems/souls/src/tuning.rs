//! Probabilities and thresholds that drive the soul behaviors.

use std::{fs, io, path::Path, path::PathBuf};

use serde::Deserialize;

/// Tunable constants for the soul, ectoplasm, tombstone and vessel hooks.
///
/// Every `*_chance` field is an independent per-tick probability in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoulTuning {
    /// Souls at or above this row vanish.
    pub ceiling_row: i32,
    /// Chance to try moving one row up.
    pub rise_chance: f64,
    /// Chance a drifting soul moves sideways.
    pub drift_chance: f64,
    /// Chance a sideways drift also climbs one row.
    pub drift_climb_chance: f64,
    /// Chance a drifting soul that moved starts descending.
    pub drift_advance_chance: f64,
    /// Chance a descending soul starts wandering.
    pub descend_advance_chance: f64,
    /// Chance a wandering soul takes a random step.
    pub wander_chance: f64,
    /// Chance a wandering soul returns to drifting.
    pub wander_return_chance: f64,
    /// Chance a soul scans its neighbours for a vacant body or head.
    pub possess_scan_chance: f64,
    /// Chance a dim soul starts glowing.
    pub glow_on_chance: f64,
    /// Chance a glowing soul dims.
    pub glow_off_chance: f64,
    /// Chance a soul drips ectoplasm below itself.
    pub ectoplasm_chance: f64,
    /// Chance a soul bursts into flashes.
    pub flash_chance: f64,
    /// Temperature given to burst flashes.
    pub flash_temperature: f32,
    /// Chance a soul reacting with a vessel possesses it.
    pub possess_reaction_chance: f64,
    /// Panic added to a body touched by a soul or ectoplasm.
    pub panic: u32,
    /// Chance a possessed body or human lets its soul go.
    pub release_chance: f64,
    /// Chance old, warm ectoplasm evaporates.
    pub ectoplasm_decay_chance: f64,
    /// Ticks ectoplasm must live before it may evaporate.
    pub ectoplasm_min_age: u64,
    /// Ectoplasm colder than this never evaporates.
    pub ectoplasm_decay_temperature: f32,
    /// Chance a tombstone raises a soul into each open side.
    pub tombstone_spawn_chance: f64,
}

impl SoulTuning {
    /// Constants the soul mod ships with.
    pub const DEFAULT: Self = Self {
        ceiling_row: 1,
        rise_chance: 0.05,
        drift_chance: 0.25,
        drift_climb_chance: 0.33,
        drift_advance_chance: 0.1,
        descend_advance_chance: 0.25,
        wander_chance: 0.25,
        wander_return_chance: 0.01,
        possess_scan_chance: 0.02,
        glow_on_chance: 0.25,
        glow_off_chance: 0.01,
        ectoplasm_chance: 0.0002,
        flash_chance: 0.001,
        flash_temperature: -10.0,
        possess_reaction_chance: 0.3,
        panic: 20,
        release_chance: 0.001,
        ectoplasm_decay_chance: 0.01,
        ectoplasm_min_age: 100,
        ectoplasm_decay_temperature: -10.0,
        tombstone_spawn_chance: 0.0001,
    };

    /// Parses tuning from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, TuningError> {
        let tuning: Self = toml::from_str(contents)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reads and parses a tuning file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| TuningError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), TuningError> {
        let probabilities = [
            ("rise_chance", self.rise_chance),
            ("drift_chance", self.drift_chance),
            ("drift_climb_chance", self.drift_climb_chance),
            ("drift_advance_chance", self.drift_advance_chance),
            ("descend_advance_chance", self.descend_advance_chance),
            ("wander_chance", self.wander_chance),
            ("wander_return_chance", self.wander_return_chance),
            ("possess_scan_chance", self.possess_scan_chance),
            ("glow_on_chance", self.glow_on_chance),
            ("glow_off_chance", self.glow_off_chance),
            ("ectoplasm_chance", self.ectoplasm_chance),
            ("flash_chance", self.flash_chance),
            ("possess_reaction_chance", self.possess_reaction_chance),
            ("release_chance", self.release_chance),
            ("ectoplasm_decay_chance", self.ectoplasm_decay_chance),
            ("tombstone_spawn_chance", self.tombstone_spawn_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(TuningError::NotAProbability { name, value });
            }
        }
        Ok(())
    }
}

impl Default for SoulTuning {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Errors raised while loading soul tuning.
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    /// The tuning file could not be read.
    #[error("failed to read soul tuning at {}", path.display())]
    Read {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file was not valid TOML for this schema.
    #[error("failed to parse soul tuning")]
    Parse(#[from] toml::de::Error),
    /// A chance lies outside `[0, 1]`.
    #[error("{name} must lie between 0 and 1, got {value}")]
    NotAProbability {
        /// Offending key.
        name: &'static str,
        /// Value that was supplied.
        value: f64,
    },
}
