//! Inter-process communication protocol.
//!
//! This module defines the message types exchanged between a supervising
//! front end (operator station, CLI) and the process controller.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: Commands sent from the front end to the controller
//! - `Event`: Notifications sent from the controller to the front end
//!
//! Every state transition, log line and alarm is published as an `Event`, so
//! a front end can render progress without polling internal state.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::alarm_models::AlarmSeverity;
use crate::process_models::ProcessState;
use crate::recipe_models::ProcessRecipe;

/// Operations sent from the front end to the controller.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// { "type": "updateRecipe", "payload": { "recipe": { "Name": "PI-film" } } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Start a run with the recipe currently loaded.
    StartProcess,

    /// Suspend the run at the next step boundary.
    PauseProcess,

    /// Continue a paused run.
    ResumeProcess,

    /// Cancel the run and emergency-stop the motion axes.
    StopProcess,

    /// Mark the step in progress as complete (operator override).
    SkipStep,

    /// Replace the recipe between runs.
    LoadRecipe { recipe: ProcessRecipe },

    /// Replace the recipe, possibly while a run is in progress.
    UpdateRecipe { recipe: ProcessRecipe },
}

/// Events sent from the controller to the front end.
///
/// ```json
/// { "type": "stateChanged", "payload": { "state": "RoughVacuum", "message": "Rough vacuum..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A run has started.
    RunStarted {
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// The process state changed.
    StateChanged { state: ProcessState, message: String },

    /// An operator-visible log line.
    Log { message: String },

    /// An alarm was raised.
    Alarm {
        code: i32,
        message: String,
        severity: AlarmSeverity,
    },

    /// A process tree node started executing.
    StepStarted { node_id: String },

    /// A process tree node completed.
    StepCompleted { node_id: String },

    /// The run ended. `success` is false for failures and cancellations.
    ProcessCompleted {
        #[ts(type = "string")]
        run_id: Uuid,
        success: bool,
    },
}
