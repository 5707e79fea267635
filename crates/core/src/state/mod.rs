//! Vacuum process state and its controller.
//!
//! This module provides:
//! - `context`: the per-controller process state shared by engine and steps
//! - `controller`: the facade that wires engine, context and process tree

pub mod context;
pub mod controller;

pub use context::{ProcessServices, VacuumContext, ATMOSPHERIC_PRESSURE};
pub use controller::VacuumProcessController;
