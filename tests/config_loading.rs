// tests/config_loading.rs

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use taskcascade::config::{load_and_validate, load_from_path, load_or_default};
use taskcascade::engine::EngineOptions;
use taskcascade::errors::CascadeError;

fn write_config(src: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(src.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_is_loaded_and_validated() {
    let file = write_config(
        r#"
[engine]
max_cascade_steps = 250
default_span_days = 5

[leveling]
daily_capacity_hours = 6.0
hours_per_day = 7.5

[store]
dir = "plans"
"#,
    );

    let cfg = load_and_validate(file.path()).expect("valid config");
    assert_eq!(cfg.store_dir(), Path::new("plans"));

    let options = cfg.engine_options();
    assert_eq!(options.max_cascade_steps, 250);
    assert_eq!(options.default_span_days, 5);
    assert_eq!(options.leveling.daily_capacity_hours, 6.0);
    assert_eq!(options.leveling.hours_per_day, 7.5);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let file = write_config("[leveling]\ndaily_capacity_hours = 4.0\n");
    let cfg = load_and_validate(file.path()).expect("valid config");

    let options = cfg.engine_options();
    let defaults = EngineOptions::default();
    assert_eq!(options.max_cascade_steps, defaults.max_cascade_steps);
    assert_eq!(options.default_span_days, defaults.default_span_days);
    assert_eq!(options.leveling.daily_capacity_hours, 4.0);
    assert_eq!(cfg.store_dir(), Path::new(".taskcascade"));
}

#[test]
fn raw_load_skips_range_checks() {
    let file = write_config("[engine]\nmax_cascade_steps = 0\n");

    let raw = load_from_path(file.path()).expect("toml parses");
    assert_eq!(raw.engine.max_cascade_steps, 0);

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, CascadeError::ConfigError(_)));
}

#[test]
fn unknown_section_is_rejected() {
    let file = write_config("[server]\nport = 8080\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, CascadeError::TomlError(_)));
}

#[test]
fn explicit_missing_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = load_or_default(Some(&missing)).unwrap_err();
    assert!(matches!(err, CascadeError::IoError(_)));
}

#[test]
fn explicit_path_wins_over_defaults() {
    let file = write_config("[engine]\ndefault_span_days = 3\n");
    let cfg = load_or_default(Some(file.path())).expect("valid config");
    assert_eq!(cfg.engine_options().default_span_days, 3);
}
