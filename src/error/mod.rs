mod app;
mod config;
mod param;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use param::ParamError;
