//! CLI interface module
//!
//! Command definitions, handlers and terminal output formatting.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};
