//! # vd-core
//!
//! Process sequencing and motion coordination for the vacuum dryer.
//!
//! This crate provides:
//! - The hardware contract consumed by the core, plus an in-process simulator
//! - Synchronized dual-Z gantry control
//! - A generic tree-driven step engine with pause, resume, stop and skip
//! - The vacuum process steps, context and controller facade
//! - Configuration and recipe loading from `.vacuum-dryer/`
//!
//! ## Modules
//!
//! - [`hal`]: Axis, digital I/O and motion card traits; [`hal::simulation`]
//! - [`motion`]: Dual-Z gantry controller
//! - [`engine`]: Process tree, step contract and scheduler
//! - [`steps`]: Chamber and pressure stage implementations
//! - [`state`]: Vacuum process context and controller facade
//! - [`alarm`]: Alarm sink and in-memory alarm manager
//! - [`config`]: Configuration loading and management

pub mod alarm;
pub mod config;
pub mod engine;
pub mod hal;
pub mod motion;
pub mod state;
pub mod steps;
