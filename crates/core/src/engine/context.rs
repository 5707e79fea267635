//! Context contract shared by the engine and the steps it runs.

use uuid::Uuid;
use vd_protocol::alarm_models::AlarmSeverity;

/// Notifications published while a run progresses.
///
/// State labels are plain strings here; the controller facade maps them onto
/// the closed `ProcessState` enumeration.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RunStarted { run_id: Uuid },
    StateChanged { state: String, message: String },
    Log(String),
    Alarm {
        code: i32,
        message: String,
        severity: AlarmSeverity,
    },
    StepStarted { node_id: String },
    StepCompleted { node_id: String },
    ProcessCompleted { run_id: Uuid, success: bool },
}

/// Per-controller mutable state consumed by the engine and by steps.
///
/// Every method takes `&self`: implementations guard their state internally
/// and must never hold a lock across a call back into the engine or while a
/// step awaits.
pub trait ProcessContext: Send + Sync + 'static {
    fn is_completed(&self, node_id: &str) -> bool;

    /// Idempotent.
    fn mark_complete(&self, node_id: &str);

    /// Ids of completed nodes, in completion order.
    fn completed_ids(&self) -> Vec<String>;

    /// Forget every completion flag.
    fn clear_flags(&self);

    /// Full per-run reset: completion flags, run/pause/error flags and any
    /// implementation-specific process values.
    fn reset_flags(&self);

    fn current_state(&self) -> String;

    /// Record the state label and publish [`EngineEvent::StateChanged`].
    fn set_state(&self, state: &str, message: &str);

    /// Record an operator-visible log line and publish it.
    fn log(&self, message: &str);

    /// Raise an alarm and publish [`EngineEvent::Alarm`].
    fn raise_alarm(&self, code: i32, message: &str);

    fn is_running(&self) -> bool;
    fn set_running(&self, running: bool);
    fn is_paused(&self) -> bool;
    fn set_paused(&self, paused: bool);
    fn has_error(&self) -> bool;
    fn set_error(&self, error: bool);

    /// Publish an event that carries no context state.
    fn emit(&self, event: EngineEvent);
}
