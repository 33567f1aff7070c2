//! Configuration loading infrastructure.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
