//! Runtime process state models.
//!
//! The engine works with free-form string state labels so that it can drive
//! any process tree. External consumers see the closed [`ProcessState`]
//! enumeration instead; [`ProcessState::from_label`] is the translation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of the vacuum-drying process as shown to operators.
///
/// Normal progression:
/// Idle -> ClosingChamber -> RoughVacuum -> FineVacuumStage1..5
/// -> HoldPressure -> VacuumBreak -> OpeningChamber -> Complete
///
/// Special states:
/// - Paused: manually paused by the operator
/// - Error: a stage failed (timeout or hardware fault)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
pub enum ProcessState {
    /// No run in progress.
    #[default]
    Idle,
    /// Machine preparing for a run.
    Initializing,
    /// Gantry moving to the open position.
    OpeningChamber,
    /// Gantry moving to the closed position.
    ClosingChamber,
    /// Rough pump evacuating the chamber.
    RoughVacuum,
    FineVacuumStage1,
    FineVacuumStage2,
    FineVacuumStage3,
    FineVacuumStage4,
    FineVacuumStage5,
    /// Holding the chamber at the reached pressure.
    HoldPressure,
    /// Venting the chamber back to atmosphere.
    VacuumBreak,
    /// Every step finished.
    Complete,
    /// A step failed and the run stopped.
    Error,
    /// Run suspended at a step boundary.
    Paused,
}

impl ProcessState {
    /// Every state, in declaration order.
    pub const ALL: [ProcessState; 15] = [
        ProcessState::Idle,
        ProcessState::Initializing,
        ProcessState::OpeningChamber,
        ProcessState::ClosingChamber,
        ProcessState::RoughVacuum,
        ProcessState::FineVacuumStage1,
        ProcessState::FineVacuumStage2,
        ProcessState::FineVacuumStage3,
        ProcessState::FineVacuumStage4,
        ProcessState::FineVacuumStage5,
        ProcessState::HoldPressure,
        ProcessState::VacuumBreak,
        ProcessState::Complete,
        ProcessState::Error,
        ProcessState::Paused,
    ];

    /// The engine label for this state.
    pub fn label(self) -> &'static str {
        match self {
            ProcessState::Idle => "Idle",
            ProcessState::Initializing => "Initializing",
            ProcessState::OpeningChamber => "OpeningChamber",
            ProcessState::ClosingChamber => "ClosingChamber",
            ProcessState::RoughVacuum => "RoughVacuum",
            ProcessState::FineVacuumStage1 => "FineVacuumStage1",
            ProcessState::FineVacuumStage2 => "FineVacuumStage2",
            ProcessState::FineVacuumStage3 => "FineVacuumStage3",
            ProcessState::FineVacuumStage4 => "FineVacuumStage4",
            ProcessState::FineVacuumStage5 => "FineVacuumStage5",
            ProcessState::HoldPressure => "HoldPressure",
            ProcessState::VacuumBreak => "VacuumBreak",
            ProcessState::Complete => "Complete",
            ProcessState::Error => "Error",
            ProcessState::Paused => "Paused",
        }
    }

    /// Translate an engine label into a state.
    ///
    /// Unknown labels map to [`ProcessState::Idle`].
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|state| state.label() == label)
            .unwrap_or(ProcessState::Idle)
    }

    /// State label for fine-vacuum stage `number` (1-based).
    pub fn fine_vacuum_stage(number: usize) -> Option<Self> {
        match number {
            1 => Some(ProcessState::FineVacuumStage1),
            2 => Some(ProcessState::FineVacuumStage2),
            3 => Some(ProcessState::FineVacuumStage3),
            4 => Some(ProcessState::FineVacuumStage4),
            5 => Some(ProcessState::FineVacuumStage5),
            _ => None,
        }
    }

    /// True for states in which no run is active.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Idle | ProcessState::Complete | ProcessState::Error
        )
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of the process for pollers such as a UI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ProcessSnapshot {
    pub state: ProcessState,

    /// Raw engine label, kept for trees that use labels outside [`ProcessState`].
    pub state_label: String,

    /// Name of the recipe in effect.
    pub recipe_name: String,

    /// Simulated chamber pressure in Pa.
    pub pressure: f64,

    /// Fine-vacuum stage in progress (1-based), 0 outside fine vacuum.
    pub fine_vacuum_stage: usize,

    pub is_running: bool,
    pub is_paused: bool,
    pub has_error: bool,

    /// Ids of the nodes completed in the current run, sorted.
    pub completed_steps: Vec<String>,

    /// Id of the node currently executing.
    pub current_step: Option<String>,

    pub z1_position: f64,
    pub z2_position: f64,
    pub valve_position: f64,

    /// Absolute position difference between the two gantry axes.
    pub sync_error: f64,
}
