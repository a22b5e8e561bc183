// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CascadeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CascadeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.leveling, raw.store))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine(cfg)?;
    validate_leveling(cfg)?;
    validate_store(cfg)?;
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.max_cascade_steps == 0 {
        return Err(CascadeError::ConfigError(
            "[engine].max_cascade_steps must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.default_span_days == 0 {
        return Err(CascadeError::ConfigError(
            "[engine].default_span_days must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_leveling(cfg: &RawConfigFile) -> Result<()> {
    let hours = [
        ("daily_capacity_hours", cfg.leveling.daily_capacity_hours),
        ("hours_per_day", cfg.leveling.hours_per_day),
    ];
    for (key, value) in hours {
        if !value.is_finite() || value <= 0.0 {
            return Err(CascadeError::ConfigError(format!(
                "[leveling].{key} must be a positive number (got {value})"
            )));
        }
    }
    Ok(())
}

fn validate_store(cfg: &RawConfigFile) -> Result<()> {
    if cfg.store.dir.as_os_str().is_empty() {
        return Err(CascadeError::ConfigError(
            "[store].dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
