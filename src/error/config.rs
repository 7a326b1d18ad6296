use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("Config 'concurrency' must be >= 1.")]
    ConcurrencyZero,
    #[error(
        "Inconsistent parameter state: found {found} of {expected} slots. \
         Remove the state files to start fresh."
    )]
    InconsistentState { found: usize, expected: usize },
    #[error("Failed to read state slot '{path}': {source}")]
    ReadState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write state slot '{path}': {source}")]
    WriteState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse state slot '{path}': {source}")]
    ParseState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
