//! Core library for the `windlass` load-generation engine.
//!
//! This crate provides the building blocks for parametrized load runs: a
//! sliding-window executor that keeps a constant number of task
//! invocations in flight, a stateful parameter model feeding `<<name>>`
//! template substitution, declarative run settings, and outcome
//! aggregation. The protocol under test is supplied by the embedding
//! application through the [`Task`] trait.
pub mod config;
pub mod error;
pub mod executor;
pub mod logger;
pub mod metrics;
pub mod params;
pub mod task;

pub use config::{ParamSpec, RunSettings, load_settings};
pub use error::{AppError, AppResult};
pub use executor::{RunConfig, RunControl, RunReport, SlidingWindow};
pub use metrics::{TimedOutcome, Totals, spawn_totals_collector};
pub use params::{Entry, LookupTable, ParamValue, Parameter, Parameters};
pub use task::{OutcomeKind, Task, TaskOutcome};
