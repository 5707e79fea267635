//! Configuration loading and management.
//!
//! This module provides functionality to load machine settings and the recipe
//! library from the `.vacuum-dryer/` directory structure.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use models::{AppConfig, MachineConfig, OutputMap};
