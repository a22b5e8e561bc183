// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::analysis::LevelingOptions;
use crate::engine::EngineOptions;

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [engine]
/// max_cascade_steps = 10000
/// default_span_days = 7
///
/// [leveling]
/// daily_capacity_hours = 8.0
/// hours_per_day = 8.0
///
/// [store]
/// dir = ".taskcascade"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub leveling: LevelingSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Upper bound on task decisions made by one cascade.
    #[serde(default = "default_max_cascade_steps")]
    pub max_cascade_steps: usize,

    /// Valid days spanned by a newly created task, both ends included.
    #[serde(default = "default_span_days")]
    pub default_span_days: u32,
}

fn default_max_cascade_steps() -> usize {
    10_000
}

fn default_span_days() -> u32 {
    7
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_cascade_steps: default_max_cascade_steps(),
            default_span_days: default_span_days(),
        }
    }
}

/// `[leveling]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelingSection {
    #[serde(default = "default_hours")]
    pub daily_capacity_hours: f64,
    #[serde(default = "default_hours")]
    pub hours_per_day: f64,
}

fn default_hours() -> f64 {
    8.0
}

impl Default for LevelingSection {
    fn default() -> Self {
        Self {
            daily_capacity_hours: default_hours(),
            hours_per_day: default_hours(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Directory holding one `<project>.json` per project.
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".taskcascade")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`
/// (see `validate.rs`) or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    engine: EngineSection,
    leveling: LevelingSection,
    store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        leveling: LevelingSection,
        store: StoreSection,
    ) -> Self {
        Self {
            engine,
            leveling,
            store,
        }
    }

    pub fn engine(&self) -> &EngineSection {
        &self.engine
    }

    pub fn leveling(&self) -> &LevelingSection {
        &self.leveling
    }

    pub fn store(&self) -> &StoreSection {
        &self.store
    }

    pub fn store_dir(&self) -> &std::path::Path {
        &self.store.dir
    }

    /// Engine options derived from the `[engine]` and `[leveling]` sections.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_cascade_steps: self.engine.max_cascade_steps,
            default_span_days: self.engine.default_span_days,
            leveling: LevelingOptions {
                daily_capacity_hours: self.leveling.daily_capacity_hours,
                hours_per_day: self.leveling.hours_per_day,
            },
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            EngineSection::default(),
            LevelingSection::default(),
            StoreSection::default(),
        )
    }
}
