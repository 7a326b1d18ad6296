use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::set::{Entry, Parameters};
use crate::error::{AppError, AppResult, ConfigError};

fn slot_path(dir: &Path, key: &str) -> std::path::PathBuf {
    dir.join(format!("{key}.state"))
}

/// Writes one JSON slot per `keep_state` parameter into `dir`, named after
/// the parameter's key in the set.
///
/// # Errors
///
/// Returns an error when a parameter's state cannot be serialized or a slot
/// file cannot be written.
pub fn save_state(params: &Parameters, dir: &Path) -> AppResult<()> {
    for (key, entry) in params.iter() {
        let Entry::Param(param) = entry else {
            continue;
        };
        if !param.keeps_state() {
            continue;
        }
        let state = param.get_state().map_err(AppError::param)?;
        let path = slot_path(dir, key);
        let text = serde_json::to_string(&state)?;
        std::fs::write(&path, text)
            .map_err(|source| AppError::config(ConfigError::WriteState { path, source }))?;
        debug!(key, "saved parameter state slot");
    }
    Ok(())
}

/// Restores every `keep_state` parameter from its slot in `dir`.
///
/// All-or-nothing: zero slots present is a fresh start, all slots present is
/// a restore, anything in between is a configuration fault so a run never
/// starts from a half-known state.
///
/// # Errors
///
/// Returns [`ConfigError::InconsistentState`] on a partial slot set, and an
/// error when a slot cannot be read, parsed, or applied.
pub fn load_state(params: &mut Parameters, dir: &Path) -> AppResult<()> {
    let keys: Vec<String> = params
        .iter()
        .filter_map(|(key, entry)| match entry {
            Entry::Param(param) if param.keeps_state() => Some(key.clone()),
            Entry::Param(_) | Entry::Int(_) | Entry::Float(_) | Entry::Str(_) => None,
        })
        .collect();

    let mut slots: Vec<(String, Value)> = Vec::with_capacity(keys.len());
    for key in &keys {
        let path = slot_path(dir, key);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let state = serde_json::from_str(&text)
                    .map_err(|source| AppError::config(ConfigError::ParseState { path, source }))?;
                slots.push((key.clone(), state));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(AppError::config(ConfigError::ReadState { path, source }));
            }
        }
    }

    if slots.is_empty() {
        debug!("no parameter state slots found, starting fresh");
        return Ok(());
    }
    if slots.len() != keys.len() {
        return Err(AppError::config(ConfigError::InconsistentState {
            found: slots.len(),
            expected: keys.len(),
        }));
    }

    for (key, state) in slots {
        if let Some(param) = params.get_param_mut(&key) {
            param.set_state(&state).map_err(AppError::param)?;
        }
        debug!(key, "restored parameter state slot");
    }
    Ok(())
}
