//! Axis state models shared between the hardware layer and observers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Discrete state reported by an axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AxisState {
    #[default]
    Unknown,
    Disabled,
    Enabled,
    Moving,
    Homing,
    Error,
    Alarm,
}

/// Snapshot of one axis, read from the hardware at the time of the call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct AxisStatus {
    pub id: usize,
    pub name: String,
    pub position: f64,
    pub target_position: f64,
    pub velocity: f64,
    /// Torque in percent of rated.
    pub torque: f64,
    pub state: AxisState,
    pub is_moving: bool,
    pub is_homed: bool,
    pub positive_limit: bool,
    pub negative_limit: bool,
}
