//! doctriage - document classification benchmarking against hosted vision models.
//!
//! Core library exposing configuration, domain models, pricing and the retry
//! and concurrency plumbing shared by the workspace crates.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod catalog;
pub mod config;
pub mod http_client;
pub mod models;
pub mod pricing;
pub mod rate_limit;

pub use catalog::{ModelSpec, Provider};
pub use config::{Config, ConfigError, RunConfig};
