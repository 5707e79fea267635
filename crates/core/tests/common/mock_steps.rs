//! Mock steps and a recording context for exercising the generic engine.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vd_core::engine::{EngineEvent, ProcessContext, ProcessNode, ProcessStep, StepError};
use vd_protocol::alarm_models::AlarmSeverity;

#[derive(Default)]
struct Recorded {
    flags: Vec<String>,
    executed: Vec<String>,
    states: Vec<String>,
    label: String,
    running: bool,
    paused: bool,
    error: bool,
}

/// Context that records every executed step and state label.
pub struct RecordingContext {
    recorded: Mutex<Recorded>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl RecordingContext {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let ctx = Self {
            recorded: Mutex::new(Recorded {
                label: "Idle".to_string(),
                ..Recorded::default()
            }),
            events,
        };
        (Arc::new(ctx), rx)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        f(&mut self.recorded.lock().expect("recording context lock"))
    }

    /// Step names in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.with(|r| r.executed.clone())
    }

    /// Every state label set, in order.
    #[allow(dead_code)]
    pub fn states(&self) -> Vec<String> {
        self.with(|r| r.states.clone())
    }

    fn record_execution(&self, step: &str) {
        self.with(|r| r.executed.push(step.to_string()));
    }
}

impl ProcessContext for RecordingContext {
    fn is_completed(&self, node_id: &str) -> bool {
        self.with(|r| r.flags.iter().any(|id| id == node_id))
    }

    fn mark_complete(&self, node_id: &str) {
        self.with(|r| {
            if !r.flags.iter().any(|id| id == node_id) {
                r.flags.push(node_id.to_string());
            }
        })
    }

    fn completed_ids(&self) -> Vec<String> {
        self.with(|r| r.flags.clone())
    }

    fn clear_flags(&self) {
        self.with(|r| r.flags.clear())
    }

    fn reset_flags(&self) {
        self.with(|r| {
            r.flags.clear();
            r.running = false;
            r.paused = false;
            r.error = false;
        })
    }

    fn current_state(&self) -> String {
        self.with(|r| r.label.clone())
    }

    fn set_state(&self, state: &str, message: &str) {
        self.with(|r| {
            r.label = state.to_string();
            r.states.push(state.to_string());
        });
        let _ = self.events.send(EngineEvent::StateChanged {
            state: state.to_string(),
            message: message.to_string(),
        });
    }

    fn log(&self, message: &str) {
        let _ = self.events.send(EngineEvent::Log(message.to_string()));
    }

    fn raise_alarm(&self, code: i32, message: &str) {
        let _ = self.events.send(EngineEvent::Alarm {
            code,
            message: message.to_string(),
            severity: AlarmSeverity::classify(code),
        });
    }

    fn is_running(&self) -> bool {
        self.with(|r| r.running)
    }

    fn set_running(&self, running: bool) {
        self.with(|r| r.running = running)
    }

    fn is_paused(&self) -> bool {
        self.with(|r| r.paused)
    }

    fn set_paused(&self, paused: bool) {
        self.with(|r| r.paused = paused)
    }

    fn has_error(&self) -> bool {
        self.with(|r| r.error)
    }

    fn set_error(&self, error: bool) {
        self.with(|r| r.error = error)
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

/// What a [`MockStep`] does when executed.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum MockBehavior {
    /// Succeed after the given delay.
    Succeed(Duration),
    /// Fail with the given reason.
    Fail(String),
    /// Only eligible once the named node has completed; then succeed.
    After(String),
}

/// Step that records its execution and behaves as configured.
pub struct MockStep {
    name: String,
    behavior: MockBehavior,
}

impl MockStep {
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
        }
    }

    pub fn instant(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Succeed(Duration::ZERO))
    }
}

#[async_trait]
impl ProcessStep<RecordingContext> for MockStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_execute(&self, ctx: &RecordingContext) -> bool {
        match &self.behavior {
            MockBehavior::After(node_id) => ctx.is_completed(node_id),
            _ => true,
        }
    }

    async fn execute(&self, ctx: &RecordingContext, cancel: &CancellationToken) -> Result<(), StepError> {
        ctx.record_execution(&self.name);
        match &self.behavior {
            MockBehavior::Succeed(delay) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(StepError::Cancelled),
                    _ = tokio::time::sleep(*delay) => Ok(()),
                }
            }
            MockBehavior::Fail(reason) => Err(StepError::Failed(anyhow::anyhow!("{reason}"))),
            MockBehavior::After(_) => Ok(()),
        }
    }
}

/// Leaf node whose step and id share `name`.
pub fn leaf(name: &str, step: MockStep) -> ProcessNode<RecordingContext> {
    ProcessNode::new(name).with_step(step).with_state(name)
}
