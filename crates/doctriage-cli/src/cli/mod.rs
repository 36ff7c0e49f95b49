//! Command-line interface for doctriage.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
