use std::path::Path;

use super::*;
use crate::error::{AppError, AppResult, ConfigError, ParamError};
use crate::params::Entry;

fn write_settings(dir: &Path, name: &str, content: &str) -> AppResult<std::path::PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content)?;
    Ok(path)
}

#[test]
fn toml_settings_build_a_run_and_parameters() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(
        dir.path(),
        "run.toml",
        r#"
concurrency = 4
stop = 20
requests-per-second = 2.5

[parameters.site]
type = "str"
value = "ams"

[parameters.device]
type = "sequence"
start = 0
wrap = 5

[parameters.port]
type = "random-value-request"
lower = 1
upper = 48
seed = 7
"#,
    )?;

    let settings = load_settings(&path)?;
    let run = settings.run_config()?;
    assert_eq!(run.concurrency, 4);
    assert_eq!(run.stop, 20);
    assert!((run.requests_per_second - 2.5).abs() < f64::EPSILON);

    let mut params = settings.build_parameters()?;
    params.update_request();
    let rendered = params.render("<<site>>/<<device>>", true);
    assert_eq!(rendered, "ams/0");
    Ok(())
}

#[test]
fn json_settings_parse_too() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(
        dir.path(),
        "run.json",
        r#"{
            "concurrency": 2,
            "parameters": {
                "id": { "type": "sequence-request", "start": 10 }
            }
        }"#,
    )?;

    let settings = load_settings(&path)?;
    assert_eq!(settings.run_config()?.concurrency, 2);
    let mut params = settings.build_parameters()?;
    params.update_request();
    assert_eq!(params.render("<<id>>", true), "10");
    Ok(())
}

#[test]
fn absent_knobs_fall_back_to_executor_defaults() -> AppResult<()> {
    let settings = RunSettings::default();
    let run = settings.run_config()?;
    assert_eq!(run.concurrency, 1);
    assert_eq!(run.stop, 0);
    assert!(run.keep_results);
    Ok(())
}

#[test]
fn zero_concurrency_is_rejected() {
    let settings = RunSettings {
        concurrency: Some(0),
        ..RunSettings::default()
    };
    assert!(matches!(
        settings.run_config(),
        Err(ConfigError::ConcurrencyZero)
    ));
}

#[test]
fn unsupported_extension_is_a_typed_error() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(dir.path(), "run.yaml", "concurrency: 2")?;
    let result = load_settings(&path);
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml"
    ));
    Ok(())
}

#[test]
fn missing_extension_is_a_typed_error() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(dir.path(), "run", "")?;
    assert!(matches!(
        load_settings(&path),
        Err(AppError::Config(ConfigError::MissingExtension))
    ));
    Ok(())
}

#[test]
fn overrides_apply_after_the_parameter_set_is_built() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(
        dir.path(),
        "run.toml",
        r#"
overrides = ["site=fra", "retries=5"]

[parameters.site]
type = "str"
value = "ams"

[parameters.retries]
type = "int"
value = 3
"#,
    )?;

    let settings = load_settings(&path)?;
    let params = settings.build_parameters()?;
    assert!(matches!(params.get("site"), Some(Entry::Str(s)) if s == "fra"));
    assert!(matches!(params.get("retries"), Some(Entry::Int(5))));
    Ok(())
}

#[test]
fn override_naming_an_unknown_key_fails() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = write_settings(
        dir.path(),
        "run.toml",
        r#"
overrides = ["nope=1"]

[parameters.site]
type = "str"
value = "ams"
"#,
    )?;

    let settings = load_settings(&path)?;
    let result = settings.build_parameters();
    assert!(matches!(
        result,
        Err(AppError::Param(ParamError::UnknownKey { key })) if key == "nope"
    ));
    Ok(())
}
