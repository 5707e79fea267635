//! Configuration models that aggregate all settings.
//!
//! This module provides the machine wiring settings and the unified
//! `AppConfig` structure that combines them with the recipe library.

use crate::engine::DEFAULT_LOOP_INTERVAL;
use crate::motion::{AxisIds, DEFAULT_SYNC_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vd_protocol::recipe_models::ProcessRecipe;

/// Digital output channels driving the vacuum valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputMap {
    pub rough_valve: usize,
    pub fine_valve: usize,
    pub break_small_valve: usize,
    pub break_large_valve: usize,
}

impl Default for OutputMap {
    fn default() -> Self {
        Self {
            rough_valve: 0,
            fine_valve: 1,
            break_small_valve: 2,
            break_large_valve: 3,
        }
    }
}

impl OutputMap {
    /// Every valve channel.
    pub fn channels(&self) -> [usize; 4] {
        [
            self.rough_valve,
            self.fine_valve,
            self.break_small_valve,
            self.break_large_valve,
        ]
    }
}

/// Machine settings from `config.toml`.
///
/// ```toml
/// loop_interval_ms = 50
/// sync_tolerance = 0.1
/// default_recipe = "PI-film"
///
/// [axes]
/// z1 = 0
/// z2 = 1
/// valve = 2
///
/// [outputs]
/// rough_valve = 0
/// fine_valve = 1
/// break_small_valve = 2
/// break_large_valve = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Engine delay between two executed nodes.
    pub loop_interval_ms: u64,

    /// Maximum |Z1 - Z2| accepted before a synchronized move.
    pub sync_tolerance: f64,

    pub axes: AxisIds,
    pub outputs: OutputMap,

    /// Recipe selected when none is named explicitly.
    pub default_recipe: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: DEFAULT_LOOP_INTERVAL.as_millis() as u64,
            sync_tolerance: DEFAULT_SYNC_TOLERANCE,
            axes: AxisIds::default(),
            outputs: OutputMap::default(),
            default_recipe: None,
        }
    }
}

impl MachineConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    /// Problems that make this configuration unusable, empty if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.sync_tolerance.is_finite() && self.sync_tolerance >= 0.0) {
            problems.push(format!("sync_tolerance must be >= 0, got {}", self.sync_tolerance));
        }
        let axes = [self.axes.z1, self.axes.z2, self.axes.valve];
        if axes[0] == axes[1] || axes[0] == axes[2] || axes[1] == axes[2] {
            problems.push(format!("axis ids must be distinct, got {axes:?}"));
        }
        let channels = self.outputs.channels();
        for (i, channel) in channels.iter().enumerate() {
            if channels[i + 1..].contains(channel) {
                problems.push(format!("output channel {channel} is assigned twice"));
            }
        }
        problems
    }
}

/// Unified application configuration loaded from `.vacuum-dryer/`.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Machine settings
/// - `recipes/*.{json,toml,yaml,yml}`: Recipe library
///
/// # Example
///
/// ```rust,no_run
/// use vd_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} recipes", config.recipes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub machine: MachineConfig,

    /// Recipes sorted by name.
    pub recipes: Vec<ProcessRecipe>,
}

impl AppConfig {
    pub fn recipe(&self, name: &str) -> Option<&ProcessRecipe> {
        self.recipes.iter().find(|recipe| recipe.name == name)
    }

    /// The configured default recipe, else the first one in the library,
    /// else the built-in defaults.
    pub fn default_recipe(&self) -> ProcessRecipe {
        self.machine
            .default_recipe
            .as_deref()
            .and_then(|name| self.recipe(name))
            .or_else(|| self.recipes.first())
            .cloned()
            .unwrap_or_default()
    }
}
