use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::executor::RunConfig;
use crate::params::{Entry, Parameter, Parameters};

/// Declarative run settings, read from a `.toml` or `.json` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunSettings {
    /// Window width. Zero is rejected at validation.
    pub concurrency: Option<usize>,
    /// Total launches; `0` (or absent) runs until stopped.
    pub stop: Option<u64>,
    pub requests_per_second: Option<f64>,
    /// Directory for `{key}.state` slots of `keep-state` parameters.
    pub state_dir: Option<PathBuf>,
    /// `key=value` overrides, applied after the parameter set is built.
    pub overrides: Vec<String>,
    pub parameters: BTreeMap<String, ParamSpec>,
    pub keep_results: Option<bool>,
    pub forward_metrics: Option<bool>,
}

impl RunSettings {
    /// Translates the file-level knobs into an executor [`RunConfig`].
    ///
    /// # Errors
    ///
    /// Rejects `concurrency = 0`.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::ConcurrencyZero);
        }
        let defaults = RunConfig::default();
        Ok(RunConfig {
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            stop: self.stop.unwrap_or(defaults.stop),
            requests_per_second: self
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
            keep_results: self.keep_results.unwrap_or(defaults.keep_results),
            forward_metrics: self.forward_metrics.unwrap_or(defaults.forward_metrics),
        })
    }

    /// Materializes the declared parameter set and applies the overrides,
    /// in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first override that names an unknown key or fails to
    /// coerce.
    pub fn build_parameters(&self) -> AppResult<Parameters> {
        let mut params: Parameters = self
            .parameters
            .iter()
            .map(|(key, spec)| (key.clone(), spec.build()))
            .collect();
        params.apply_overrides(&self.overrides)?;
        Ok(params)
    }
}

/// File-level mirror of the parameter variants plus plain literals.
///
/// Lookup tables carry application data and are wired up in code, so
/// there is no `lookup` spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum ParamSpec {
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    Str {
        value: String,
    },
    Sequence {
        start: i64,
        wrap: Option<i64>,
        #[serde(default)]
        keep_state: bool,
    },
    SequenceRequest {
        start: i64,
        wrap: Option<i64>,
        #[serde(default)]
        keep_state: bool,
    },
    SequenceBatch {
        start: i64,
        #[serde(default)]
        keep_state: bool,
    },
    SequenceRequestRandomized {
        length: u64,
        wrap: Option<u64>,
        seed: Option<u64>,
    },
    RandomValue {
        lower: i64,
        upper: i64,
        wrap: Option<u64>,
        seed: Option<u64>,
        #[serde(default)]
        keep_state: bool,
    },
    RandomValueRequest {
        lower: i64,
        upper: i64,
        wrap: Option<u64>,
        seed: Option<u64>,
        #[serde(default)]
        keep_state: bool,
    },
    RandomString {
        length: usize,
        wrap: Option<u64>,
        seed: Option<u64>,
        #[serde(default)]
        keep_state: bool,
    },
    RandomStringRequest {
        length: usize,
        seed: Option<u64>,
        #[serde(default)]
        keep_state: bool,
    },
    Calc {
        param: String,
        wrap: i64,
        mul: i64,
        add: i64,
    },
}

impl ParamSpec {
    /// Builds the live [`Entry`] this spec describes.
    #[must_use]
    pub fn build(&self) -> Entry {
        fn kept(param: Parameter, keep_state: bool) -> Entry {
            if keep_state {
                Entry::Param(param.keep_state())
            } else {
                Entry::Param(param)
            }
        }

        match self {
            ParamSpec::Int { value } => Entry::Int(*value),
            ParamSpec::Float { value } => Entry::Float(*value),
            ParamSpec::Str { value } => Entry::Str(value.clone()),
            ParamSpec::Sequence {
                start,
                wrap,
                keep_state,
            } => kept(Parameter::sequence(*start, *wrap), *keep_state),
            ParamSpec::SequenceRequest {
                start,
                wrap,
                keep_state,
            } => kept(Parameter::sequence_request(*start, *wrap), *keep_state),
            ParamSpec::SequenceBatch { start, keep_state } => {
                kept(Parameter::sequence_batch(*start), *keep_state)
            }
            ParamSpec::SequenceRequestRandomized { length, wrap, seed } => Entry::Param(
                Parameter::sequence_request_randomized(*length, *wrap, *seed),
            ),
            ParamSpec::RandomValue {
                lower,
                upper,
                wrap,
                seed,
                keep_state,
            } => kept(
                Parameter::random_value(*lower, *upper, *wrap, *seed),
                *keep_state,
            ),
            ParamSpec::RandomValueRequest {
                lower,
                upper,
                wrap,
                seed,
                keep_state,
            } => kept(
                Parameter::random_value_request(*lower, *upper, *wrap, *seed),
                *keep_state,
            ),
            ParamSpec::RandomString {
                length,
                wrap,
                seed,
                keep_state,
            } => kept(Parameter::random_string(*length, *wrap, *seed), *keep_state),
            ParamSpec::RandomStringRequest {
                length,
                seed,
                keep_state,
            } => kept(Parameter::random_string_request(*length, *seed), *keep_state),
            ParamSpec::Calc {
                param,
                wrap,
                mul,
                add,
            } => Entry::Param(Parameter::calc(param.clone(), *wrap, *mul, *add)),
        }
    }
}
