//! Vacuum process context.
//!
//! One [`VacuumContext`] exists per controller. It carries the recipe, the
//! hardware services, the simulated chamber pressure and the run flags the
//! engine and the steps share. Every field is behind its own lock taken for a
//! single operation, so observers can read it while a run is in progress.

use crate::alarm::{AlarmManager, AlarmSink};
use crate::config::OutputMap;
use crate::engine::{EngineEvent, ProcessContext};
use crate::hal::{DigitalIo, HalResult};
use crate::motion::DualZController;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use vd_protocol::alarm_models::AlarmSeverity;
use vd_protocol::recipe_models::ProcessRecipe;

/// Chamber pressure at the start of every run, in Pa.
pub const ATMOSPHERIC_PRESSURE: f64 = 101_325.0;

/// Hardware collaborators the vacuum steps drive.
#[derive(Clone)]
pub struct ProcessServices {
    pub motion: Arc<DualZController>,
    pub io: Arc<dyn DigitalIo>,
    pub outputs: OutputMap,
}

#[derive(Debug)]
struct ContextState {
    /// Completed node ids, in completion order.
    completed: Vec<String>,
    current_state: String,
    state_message: String,
    running: bool,
    paused: bool,
    error: bool,
    pressure: f64,
    fine_stage: usize,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            current_state: "Idle".to_string(),
            state_message: String::new(),
            running: false,
            paused: false,
            error: false,
            pressure: ATMOSPHERIC_PRESSURE,
            fine_stage: 0,
        }
    }
}

/// Context handed to the engine and every vacuum step.
pub struct VacuumContext {
    services: ProcessServices,
    recipe: RwLock<Arc<ProcessRecipe>>,
    state: Mutex<ContextState>,
    alarms: Arc<AlarmManager>,
    events: UnboundedSender<EngineEvent>,
}

impl VacuumContext {
    pub fn new(
        services: ProcessServices,
        recipe: ProcessRecipe,
        alarms: Arc<AlarmManager>,
        events: UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            services,
            recipe: RwLock::new(Arc::new(recipe)),
            state: Mutex::new(ContextState::default()),
            alarms,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recipe in effect. Steps take one snapshot at their start.
    pub fn recipe(&self) -> Arc<ProcessRecipe> {
        Arc::clone(&self.recipe.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn set_recipe(&self, recipe: ProcessRecipe) {
        *self.recipe.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(recipe);
    }

    pub fn services(&self) -> &ProcessServices {
        &self.services
    }

    pub fn motion(&self) -> &DualZController {
        &self.services.motion
    }

    pub fn io(&self) -> &dyn DigitalIo {
        self.services.io.as_ref()
    }

    pub fn outputs(&self) -> OutputMap {
        self.services.outputs
    }

    pub fn alarms(&self) -> &Arc<AlarmManager> {
        &self.alarms
    }

    pub fn write_output(&self, channel: usize, value: bool) -> HalResult<()> {
        self.services.io.write_output(channel, value)
    }

    pub fn pressure(&self) -> f64 {
        self.state().pressure
    }

    pub fn set_pressure(&self, pressure: f64) {
        self.state().pressure = pressure;
    }

    /// Multiply the pressure by `factor` and return the new value.
    pub fn scale_pressure(&self, factor: f64) -> f64 {
        let mut state = self.state();
        state.pressure *= factor;
        state.pressure
    }

    /// Fine-vacuum stage in progress (1-based), 0 outside fine vacuum.
    pub fn fine_vacuum_stage(&self) -> usize {
        self.state().fine_stage
    }

    pub fn set_fine_vacuum_stage(&self, stage: usize) {
        self.state().fine_stage = stage;
    }

    pub fn state_message(&self) -> String {
        self.state().state_message.clone()
    }

    fn send(&self, event: EngineEvent) {
        // The receiver goes away when the controller shuts down
        let _ = self.events.send(event);
    }
}

impl ProcessContext for VacuumContext {
    fn is_completed(&self, node_id: &str) -> bool {
        self.state().completed.iter().any(|id| id == node_id)
    }

    fn mark_complete(&self, node_id: &str) {
        let mut state = self.state();
        if !state.completed.iter().any(|id| id == node_id) {
            state.completed.push(node_id.to_string());
        }
    }

    fn completed_ids(&self) -> Vec<String> {
        self.state().completed.clone()
    }

    fn clear_flags(&self) {
        self.state().completed.clear();
    }

    fn reset_flags(&self) {
        let mut state = self.state();
        state.completed.clear();
        state.running = false;
        state.paused = false;
        state.error = false;
        state.pressure = ATMOSPHERIC_PRESSURE;
        state.fine_stage = 0;
    }

    fn current_state(&self) -> String {
        self.state().current_state.clone()
    }

    fn set_state(&self, state: &str, message: &str) {
        {
            let mut current = self.state();
            current.current_state = state.to_string();
            current.state_message = message.to_string();
        }
        info!(target: "vd_core::process", state, message, "state changed");
        self.send(EngineEvent::StateChanged {
            state: state.to_string(),
            message: message.to_string(),
        });
    }

    fn log(&self, message: &str) {
        info!(target: "vd_core::process", "{message}");
        self.send(EngineEvent::Log(message.to_string()));
    }

    fn raise_alarm(&self, code: i32, message: &str) {
        let severity = AlarmSeverity::classify(code);
        let source = self.current_state();
        self.alarms.raise(code, message, severity, &source);
        self.send(EngineEvent::Alarm {
            code,
            message: message.to_string(),
            severity,
        });
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn set_running(&self, running: bool) {
        self.state().running = running;
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn set_paused(&self, paused: bool) {
        self.state().paused = paused;
    }

    fn has_error(&self) -> bool {
        self.state().error
    }

    fn set_error(&self, error: bool) {
        self.state().error = error;
    }

    fn emit(&self, event: EngineEvent) {
        self.send(event);
    }
}
