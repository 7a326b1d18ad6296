use thiserror::Error;

use super::{ConfigError, ParamError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Parse error: {source}")]
    ParseInt {
        #[from]
        source: std::num::ParseIntError,
    },
    #[error("Parse error: {source}")]
    ParseFloat {
        #[from]
        source: std::num::ParseFloatError,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
    #[error("Task setup failed: {message}")]
    Setup { message: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn param<E>(error: E) -> Self
    where
        E: Into<ParamError>,
    {
        error.into().into()
    }

    pub fn setup(message: impl Into<String>) -> Self {
        AppError::Setup {
            message: message.into(),
        }
    }
}
