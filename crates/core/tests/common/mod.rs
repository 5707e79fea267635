//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality across all integration tests
//! including:
//! - Test fixtures (simulated machine, recipes, config directories)
//! - Custom assertions over the event surface
//! - Mock steps and a recording context for engine tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod mock_steps;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_steps::*;
