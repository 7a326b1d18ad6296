//! Declarative run settings: file loading and parameter-set construction.
mod loader;
pub mod types;

#[cfg(test)]
mod tests;

pub use loader::load_settings;
pub use types::{ParamSpec, RunSettings};
