//! Process recipe models.
//!
//! A recipe is the named parameter set that drives one vacuum-drying run.
//! It is serialized as a flat document of PascalCase named fields so that
//! recipe files written by the operator station round-trip unchanged:
//!
//! ```json
//! {
//!   "Name": "PI-film",
//!   "RoughVacuumTargetPressure": 1000.0,
//!   "RoughVacuumTimeout": 60,
//!   "FineVacuumStages": [ { "StartPressure": 1000.0, "...": "..." } ],
//!   "HoldPressureDuration": 30
//! }
//! ```
//!
//! Unknown fields are ignored and missing fields take the defaults of
//! [`ProcessRecipe::default`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Number of fine-vacuum sub-stages in every recipe.
pub const FINE_VACUUM_STAGE_COUNT: usize = 5;

/// Parameters for one fine-vacuum sub-stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default, rename_all = "PascalCase")]
pub struct FineVacuumStageParams {
    /// The stage ends early once the chamber pressure (Pa) drops to this value.
    pub start_pressure: f64,

    /// Nominal pressure (Pa) the stage aims for.
    pub target_pressure: f64,

    /// Stage duration in seconds.
    pub duration: u64,

    /// Throttle valve opening in percent of travel.
    pub valve_angle: f64,

    /// Hold-pressure mode flag, carried for the operator station.
    pub hold_pressure: bool,

    /// Stage timeout in seconds. Exceeding it raises the stage alarm.
    pub timeout: u64,
}

impl Default for FineVacuumStageParams {
    fn default() -> Self {
        Self {
            start_pressure: 1000.0,
            target_pressure: 500.0,
            duration: 10,
            valve_angle: 90.0,
            hold_pressure: false,
            timeout: 30,
        }
    }
}

impl FineVacuumStageParams {
    fn new(start_pressure: f64, target_pressure: f64, valve_angle: f64) -> Self {
        Self {
            start_pressure,
            target_pressure,
            valve_angle,
            ..Self::default()
        }
    }
}

/// Complete parameter set for one process run.
///
/// Steps read the recipe through the process context and never mutate it.
/// A new recipe may be swapped in between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProcessRecipe {
    /// Recipe name, also used as the file stem when saved.
    pub name: String,

    /// Rough vacuum ends when the pressure (Pa) reaches this value.
    pub rough_vacuum_target_pressure: f64,

    /// Rough vacuum timeout in seconds.
    pub rough_vacuum_timeout: u64,

    /// The five fine-vacuum sub-stages, in execution order.
    #[serde(alias = "HighVacuumStages")]
    pub fine_vacuum_stages: [FineVacuumStageParams; FINE_VACUUM_STAGE_COUNT],

    /// Hold time in seconds.
    pub hold_pressure_duration: u64,

    /// Nominal hold pressure (Pa).
    pub hold_pressure_target: f64,

    /// Seconds to wait on the small break valve before the large one is opened.
    pub vacuum_break_small_valve_timeout: u64,

    /// Overall vacuum-break timeout in seconds.
    pub vacuum_break_timeout: u64,

    /// Gantry position (mm) with the chamber fully open.
    pub chamber_open_position: f64,

    /// Gantry position (mm) with the chamber closed.
    pub chamber_close_position: f64,

    /// Gantry position (mm) where the closing move slows down.
    pub chamber_slowdown_position: f64,

    /// Gantry speed (mm/s) for the fast segment of chamber moves.
    pub chamber_fast_speed: f64,

    /// Gantry speed (mm/s) for the final closing segment.
    pub chamber_slow_speed: f64,

    /// Throttle valve speed (%/s).
    pub valve_speed: f64,
}

impl Default for ProcessRecipe {
    fn default() -> Self {
        let mut last = FineVacuumStageParams::new(50.0, 10.0, 10.0);
        last.hold_pressure = true;
        last.timeout = 60;

        Self {
            name: "Default".to_string(),
            rough_vacuum_target_pressure: 1000.0,
            rough_vacuum_timeout: 60,
            fine_vacuum_stages: [
                FineVacuumStageParams::new(1000.0, 500.0, 90.0),
                FineVacuumStageParams::new(500.0, 200.0, 70.0),
                FineVacuumStageParams::new(200.0, 100.0, 50.0),
                FineVacuumStageParams::new(100.0, 50.0, 30.0),
                last,
            ],
            hold_pressure_duration: 30,
            hold_pressure_target: 10.0,
            vacuum_break_small_valve_timeout: 10,
            vacuum_break_timeout: 30,
            chamber_open_position: 0.0,
            chamber_close_position: 300.0,
            chamber_slowdown_position: 280.0,
            chamber_fast_speed: 100.0,
            chamber_slow_speed: 20.0,
            valve_speed: 30.0,
        }
    }
}

impl ProcessRecipe {
    /// Check the recipe for values no run could execute.
    ///
    /// Returns one message per problem found; an empty vector means the
    /// recipe is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("recipe name is empty".to_string());
        }
        if self.rough_vacuum_timeout == 0 {
            problems.push("RoughVacuumTimeout must be greater than zero".to_string());
        }
        if self.rough_vacuum_target_pressure <= 0.0 {
            problems.push("RoughVacuumTargetPressure must be positive".to_string());
        }
        for (index, stage) in self.fine_vacuum_stages.iter().enumerate() {
            let number = index + 1;
            if stage.timeout == 0 {
                problems.push(format!("fine vacuum stage {number}: Timeout must be greater than zero"));
            }
            if !(0.0..=100.0).contains(&stage.valve_angle) {
                problems.push(format!(
                    "fine vacuum stage {number}: ValveAngle {} is outside 0..=100",
                    stage.valve_angle
                ));
            }
        }
        if self.vacuum_break_timeout == 0 {
            problems.push("VacuumBreakTimeout must be greater than zero".to_string());
        }
        if self.vacuum_break_small_valve_timeout > self.vacuum_break_timeout {
            problems.push(
                "VacuumBreakSmallValveTimeout must not exceed VacuumBreakTimeout".to_string(),
            );
        }
        if self.chamber_fast_speed <= 0.0
            || self.chamber_slow_speed <= 0.0
            || self.valve_speed <= 0.0
        {
            problems.push("chamber and valve speeds must be positive".to_string());
        }

        let (low, high) = if self.chamber_open_position <= self.chamber_close_position {
            (self.chamber_open_position, self.chamber_close_position)
        } else {
            (self.chamber_close_position, self.chamber_open_position)
        };
        if !(low..=high).contains(&self.chamber_slowdown_position) {
            problems.push(format!(
                "ChamberSlowdownPosition {} is not between the open and close positions",
                self.chamber_slowdown_position
            ));
        }

        problems
    }

    /// Parameters for fine-vacuum stage `number` (1-based).
    pub fn fine_stage(&self, number: usize) -> Option<&FineVacuumStageParams> {
        number
            .checked_sub(1)
            .and_then(|index| self.fine_vacuum_stages.get(index))
    }
}
