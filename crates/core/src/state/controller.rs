//! Vacuum process controller facade.
//!
//! The VacuumProcessController wires the engine, the vacuum context and the
//! default process tree together. It is the surface a front end talks to:
//! operations go in through typed methods or [`Op`], and every engine and
//! context notification comes out as a protocol [`Event`].

use super::context::{ProcessServices, VacuumContext};
use crate::alarm::AlarmManager;
use crate::config::MachineConfig;
use crate::engine::{EngineError, EngineEvent, ProcessContext, ProcessEngine, ProcessNode, RunOutcome};
use crate::hal::{HalError, MotionCard};
use crate::motion::{DualZController, MotionResult};
use crate::steps::{
    CloseChamberStep, FineVacuumStep, HoldPressureStep, OpenChamberStep, RoughVacuumStep, VacuumBreakStep,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vd_protocol::ipc::{Event, Op};
use vd_protocol::process_models::{ProcessSnapshot, ProcessState};
use vd_protocol::recipe_models::{ProcessRecipe, FINE_VACUUM_STAGE_COUNT};

/// Translate an engine notification into the protocol event surface.
fn to_protocol(event: EngineEvent) -> Event {
    match event {
        EngineEvent::RunStarted { run_id } => Event::RunStarted { run_id },
        EngineEvent::StateChanged { state, message } => Event::StateChanged {
            state: ProcessState::from_label(&state),
            message,
        },
        EngineEvent::Log(message) => Event::Log { message },
        EngineEvent::Alarm {
            code,
            message,
            severity,
        } => Event::Alarm {
            code,
            message,
            severity,
        },
        EngineEvent::StepStarted { node_id } => Event::StepStarted { node_id },
        EngineEvent::StepCompleted { node_id } => Event::StepCompleted { node_id },
        EngineEvent::ProcessCompleted { run_id, success } => Event::ProcessCompleted { run_id, success },
    }
}

/// Front-end facing controller for one vacuum dryer.
pub struct VacuumProcessController {
    ctx: Arc<VacuumContext>,
    engine: Arc<ProcessEngine<VacuumContext>>,
}

impl VacuumProcessController {
    /// Build a controller on `card` with the default process tree.
    ///
    /// Must be called inside a tokio runtime: a forwarding task republishes
    /// notifications on `events_tx` until the controller and every run it
    /// started are gone.
    ///
    /// # Errors
    ///
    /// Returns `HalError::AxisNotFound` if the configured axes do not exist
    /// and `HalError::NoDigitalIo` if the card has no I/O bank.
    pub fn new(
        card: &dyn MotionCard,
        config: &MachineConfig,
        recipe: ProcessRecipe,
        events_tx: mpsc::Sender<Event>,
    ) -> Result<Self, HalError> {
        let motion = DualZController::new(card, config.axes)?.with_sync_tolerance(config.sync_tolerance);
        let io = card.digital_io().ok_or(HalError::NoDigitalIo)?;
        let services = ProcessServices {
            motion: Arc::new(motion),
            io,
            outputs: config.outputs,
        };
        Ok(Self::from_services(services, config, recipe, events_tx))
    }

    /// Build a controller on already-assembled services.
    pub fn from_services(
        services: ProcessServices,
        config: &MachineConfig,
        recipe: ProcessRecipe,
        events_tx: mpsc::Sender<Event>,
    ) -> Self {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(VacuumContext::new(
            services,
            recipe,
            Arc::new(AlarmManager::default()),
            engine_tx,
        ));

        tokio::spawn(async move {
            let mut events = UnboundedReceiverStream::new(engine_rx).map(to_protocol);
            while let Some(event) = events.next().await {
                // A closed receiver only means nobody is watching
                let _ = events_tx.send(event).await;
            }
            debug!("event forwarder finished");
        });

        let engine = ProcessEngine::new()
            .with_loop_interval(config.loop_interval())
            .with_process_tree(Self::default_tree());

        Self {
            ctx,
            engine: Arc::new(engine),
        }
    }

    /// The standard sequence as a chain, each node the child of the one
    /// before: CloseChamber, RoughVacuum, FineVacuum1..5, HoldPressure,
    /// VacuumBreak, OpenChamber.
    pub fn default_tree() -> ProcessNode<VacuumContext> {
        let mut chain = vec![
            ProcessNode::new("CloseChamber")
                .with_step(CloseChamberStep)
                .with_state(ProcessState::ClosingChamber.label())
                .with_message("Closing chamber..."),
            ProcessNode::new("RoughVacuum")
                .with_step(RoughVacuumStep)
                .with_state(ProcessState::RoughVacuum.label())
                .with_message("Rough vacuum..."),
        ];
        for stage in 1..=FINE_VACUUM_STAGE_COUNT {
            let state = ProcessState::fine_vacuum_stage(stage).unwrap_or_default();
            chain.push(
                ProcessNode::new(format!("FineVacuum{stage}"))
                    .with_step(FineVacuumStep::new(stage))
                    .with_state(state.label())
                    .with_message(format!("Fine vacuum stage {stage}...")),
            );
        }
        chain.extend([
            ProcessNode::new("HoldPressure")
                .with_step(HoldPressureStep)
                .with_state(ProcessState::HoldPressure.label())
                .with_message("Holding pressure..."),
            ProcessNode::new("VacuumBreak")
                .with_step(VacuumBreakStep)
                .with_state(ProcessState::VacuumBreak.label())
                .with_message("Breaking vacuum..."),
            ProcessNode::new("OpenChamber")
                .with_step(OpenChamberStep)
                .with_state(ProcessState::OpeningChamber.label())
                .with_message("Opening chamber..."),
        ]);

        let tail = chain
            .into_iter()
            .rev()
            .reduce(|child, parent| parent.add_child(child));
        match tail {
            Some(first) => ProcessNode::new("Root").add_child(first),
            None => ProcessNode::new("Root"),
        }
    }

    pub fn context(&self) -> &Arc<VacuumContext> {
        &self.ctx
    }

    pub fn engine(&self) -> &Arc<ProcessEngine<VacuumContext>> {
        &self.engine
    }

    pub fn motion(&self) -> &DualZController {
        self.ctx.motion()
    }

    pub fn alarms(&self) -> &Arc<AlarmManager> {
        self.ctx.alarms()
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_label(&self.ctx.current_state())
    }

    pub fn recipe(&self) -> Arc<ProcessRecipe> {
        self.ctx.recipe()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// Enable every axis and home them.
    pub async fn initialize_axes(&self, cancel: &CancellationToken) -> MotionResult<()> {
        let motion = self.ctx.motion();
        motion.enable_all().await?;
        motion.home_all(cancel).await
    }

    /// Run the process tree to its end.
    pub async fn start(&self) -> Result<RunOutcome, EngineError> {
        self.engine.run(&self.ctx).await
    }

    /// Run the process tree on a spawned task.
    ///
    /// The run is claimed before this returns, so back-to-back calls cannot
    /// both be accepted.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyRunning` if a run is active.
    pub fn start_background(&self) -> Result<JoinHandle<RunOutcome>, EngineError> {
        self.engine.spawn_run(Arc::clone(&self.ctx))
    }

    pub fn pause(&self) -> bool {
        self.engine.pause(&self.ctx)
    }

    pub fn resume(&self) -> bool {
        self.engine.resume(&self.ctx)
    }

    /// Stop the run, emergency-stop every axis and close every valve output.
    ///
    /// Outputs are closed here as well as by the steps: between two nodes, or
    /// during the hold, no step owns the fine valve.
    pub async fn stop(&self) {
        self.engine.stop(&self.ctx);
        self.ctx.motion().emergency_stop_all().await;
        for channel in self.ctx.outputs().channels() {
            if let Err(e) = self.ctx.write_output(channel, false) {
                warn!(channel, error = %e, "output not closed on stop");
            }
        }
    }

    pub fn skip_current_step(&self) -> Option<String> {
        let skipped = self.engine.skip_current_step(&self.ctx);
        if let Some(node_id) = &skipped {
            self.ctx.log(&format!("Step skipped by operator: {node_id}"));
        }
        skipped
    }

    /// Replace the recipe between runs.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyRunning` while a run is active; use
    /// [`update_recipe`](Self::update_recipe) to change parameters mid-run.
    pub fn load_recipe(&self, recipe: ProcessRecipe) -> Result<(), EngineError> {
        if self.engine.is_active() {
            return Err(EngineError::AlreadyRunning);
        }
        info!(recipe = %recipe.name, "recipe loaded");
        self.ctx.set_recipe(recipe);
        Ok(())
    }

    /// Replace the recipe, even during a run.
    ///
    /// A step reads the recipe once when it starts, so a change made mid-run
    /// applies from the next stage.
    pub fn update_recipe(&self, recipe: ProcessRecipe) {
        if self.engine.is_active() {
            warn!(recipe = %recipe.name, "recipe updated during a run");
            self.ctx
                .log("Recipe updated during a run; changes apply from the next stage");
        }
        self.ctx.set_recipe(recipe);
    }

    /// Substitute the process tree between runs.
    pub fn set_process_tree(&self, root: ProcessNode<VacuumContext>) -> Result<(), EngineError> {
        self.engine.set_process_tree(root)
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        let state_label = self.ctx.current_state();
        let mut completed_steps = self.ctx.completed_ids();
        completed_steps.sort();
        let motion = self.ctx.motion();
        let (z1_position, z2_position, valve_position) = motion.positions();

        ProcessSnapshot {
            state: ProcessState::from_label(&state_label),
            state_label,
            recipe_name: self.ctx.recipe().name.clone(),
            pressure: self.ctx.pressure(),
            fine_vacuum_stage: self.ctx.fine_vacuum_stage(),
            is_running: self.ctx.is_running(),
            is_paused: self.ctx.is_paused(),
            has_error: self.ctx.has_error(),
            completed_steps,
            current_step: self.engine.current_node_id(),
            z1_position,
            z2_position,
            valve_position,
            sync_error: motion.sync_error(),
        }
    }

    /// Dispatch a front-end operation. `StartProcess` runs in the background.
    pub async fn handle_op(&self, op: Op) -> Result<(), EngineError> {
        match op {
            Op::StartProcess => {
                self.start_background()?;
            }
            Op::PauseProcess => {
                self.pause();
            }
            Op::ResumeProcess => {
                self.resume();
            }
            Op::StopProcess => self.stop().await,
            Op::SkipStep => {
                self.skip_current_step();
            }
            Op::LoadRecipe { recipe } => self.load_recipe(recipe)?,
            Op::UpdateRecipe { recipe } => self.update_recipe(recipe),
        }
        Ok(())
    }
}
