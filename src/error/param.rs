use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Unknown parameter key '{key}'.")]
    UnknownKey { key: String },
    #[error("Malformed override '{entry}'. Use key=value.")]
    MalformedOverride { entry: String },
    #[error("Override for '{key}' must be an integer: {source}")]
    InvalidIntOverride {
        key: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Override for '{key}' must be a float: {source}")]
    InvalidFloatOverride {
        key: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("Parameter variant '{variant}' does not accept overrides.")]
    OverrideUnsupported { variant: &'static str },
    #[error("Invalid override value '{value}' for variant '{variant}': {source}")]
    InvalidVariantOverride {
        variant: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Parameter variant '{variant}' does not support persisted state.")]
    StateUnsupported { variant: &'static str },
    #[error("Persisted state for variant '{variant}' has the wrong shape.")]
    StateShape { variant: &'static str },
}
