//! # vd-protocol
//!
//! Core protocol definitions and data models for the vacuum dryer sequencer.
//!
//! This crate defines all shared data structures used for:
//! - Recipe documents exchanged with the persistence collaborator
//! - Runtime process state and snapshots
//! - Alarms and axis status
//! - Communication between a front end and the process controller
//!
//! ## Modules
//!
//! - [`recipe_models`]: Process recipe and fine-vacuum stage parameters
//! - [`process_models`]: Closed process state enumeration and snapshots
//! - [`alarm_models`]: Alarm records, severity and the alarm code table
//! - [`axis_models`]: Axis state and status snapshots
//! - [`ipc`]: Operations and Events for front end / controller communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, uuid and chrono
//! - TypeScript generation: All types derive `TS` for front end compatibility
//! - Independent compilation: No dependencies on other workspace crates

pub mod alarm_models;
pub mod axis_models;
pub mod ipc;
pub mod process_models;
pub mod recipe_models;

// Re-export all public types for convenience
pub use alarm_models::*;
pub use axis_models::*;
pub use ipc::*;
pub use process_models::*;
pub use recipe_models::*;
