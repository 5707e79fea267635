//! Process execution engine.
//!
//! The ProcessEngine drives a tree of [`ProcessStep`]s. Each tick it runs the
//! first node, in depth-first pre-order, that has a step, is not completed and
//! whose step accepts the context. A run ends when no such node remains, when
//! a step fails, or when the run is stopped.
//!
//! Control operations (`pause`, `resume`, `stop`, `skip_current_step`) are
//! called from other tasks while `run` is in progress.

mod context;
mod node;
mod step;

pub use context::{EngineEvent, ProcessContext};
pub use node::ProcessNode;
pub use step::{ProcessStep, StepError};

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Delay between two executed nodes.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_millis(50);

/// Reasons `run` refuses to start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("A process run is already active")]
    AlreadyRunning,

    #[error("No process tree has been set")]
    NoProcessTree,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every eligible node completed.
    Completed,
    /// A step failed; the context carries the error flag.
    Failed { node_id: String, reason: String },
    /// The run was stopped.
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

struct Control<C: ProcessContext> {
    active: bool,
    cancel: CancellationToken,
    step_cancel: CancellationToken,
    current: Option<Arc<ProcessNode<C>>>,
    last_label: Option<(String, String)>,
}

/// Tree-driven step scheduler.
///
/// One engine serves one context at a time; it is not reentrant. Share it
/// behind an `Arc` to control a run from other tasks.
pub struct ProcessEngine<C: ProcessContext> {
    root: RwLock<Option<Arc<ProcessNode<C>>>>,
    control: Mutex<Control<C>>,
    paused: watch::Sender<bool>,
    loop_interval: Duration,
}

impl<C: ProcessContext> Default for ProcessEngine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ProcessContext> ProcessEngine<C> {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            root: RwLock::new(None),
            control: Mutex::new(Control {
                active: false,
                cancel: CancellationToken::new(),
                step_cancel: CancellationToken::new(),
                current: None,
                last_label: None,
            }),
            paused,
            loop_interval: DEFAULT_LOOP_INTERVAL,
        }
    }

    pub fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    /// Install the process tree on an engine that is not shared yet.
    pub fn with_process_tree(self, root: ProcessNode<C>) -> Self {
        *self.root.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(root));
        self
    }

    pub fn loop_interval(&self) -> Duration {
        self.loop_interval
    }

    fn control(&self) -> MutexGuard<'_, Control<C>> {
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the process tree.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyRunning` while a run is active.
    pub fn set_process_tree(&self, root: ProcessNode<C>) -> Result<(), EngineError> {
        let control = self.control();
        if control.active {
            return Err(EngineError::AlreadyRunning);
        }
        *self.root.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(root));
        Ok(())
    }

    pub fn process_tree(&self) -> Option<Arc<ProcessNode<C>>> {
        self.root
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True from the moment `run` is accepted until it returns.
    pub fn is_active(&self) -> bool {
        self.control().active
    }

    /// Id of the node whose step is executing.
    pub fn current_node_id(&self) -> Option<String> {
        self.control().current.as_ref().map(|node| node.id().to_string())
    }

    fn pause_requested(&self) -> bool {
        *self.paused.borrow()
    }

    /// Claim the engine for one run.
    fn reserve(&self) -> Result<(Arc<ProcessNode<C>>, CancellationToken), EngineError> {
        let mut control = self.control();
        if control.active {
            return Err(EngineError::AlreadyRunning);
        }
        let root = self.process_tree().ok_or(EngineError::NoProcessTree)?;
        control.active = true;
        control.cancel = CancellationToken::new();
        control.current = None;
        control.last_label = None;
        Ok((root, control.cancel.clone()))
    }

    /// Execute the process tree against `ctx`.
    ///
    /// # Errors
    ///
    /// Fails without touching the context if a run is already active or no
    /// tree has been set. Step failures and cancellation are reported through
    /// the returned [`RunOutcome`], not as errors.
    pub async fn run(&self, ctx: &C) -> Result<RunOutcome, EngineError> {
        let (root, cancel) = self.reserve()?;
        Ok(self.execute(ctx, &root, &cancel).await)
    }

    /// Claim the engine now and execute the run on a spawned task.
    ///
    /// The engine is active once this returns `Ok`, so a second call made
    /// before the task is polled is already rejected.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn spawn_run(self: &Arc<Self>, ctx: Arc<C>) -> Result<JoinHandle<RunOutcome>, EngineError> {
        let (root, cancel) = self.reserve()?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move { engine.execute(&ctx, &root, &cancel).await }))
    }

    async fn execute(&self, ctx: &C, root: &Arc<ProcessNode<C>>, cancel: &CancellationToken) -> RunOutcome {
        ctx.reset_flags();
        ctx.set_error(false);
        ctx.set_paused(false);
        ctx.set_running(true);
        self.paused.send_replace(false);

        let run_id = Uuid::new_v4();
        info!(%run_id, "process run started");
        ctx.emit(EngineEvent::RunStarted { run_id });

        let outcome = self.run_loop(ctx, root, cancel).await;

        // Nothing is left to run or to hold
        ctx.set_running(false);
        ctx.set_paused(false);
        self.paused.send_replace(false);
        {
            let mut control = self.control();
            control.active = false;
            control.current = None;
            control.last_label = None;
        }

        match &outcome {
            RunOutcome::Completed => info!(%run_id, "process run completed"),
            RunOutcome::Failed { node_id, reason } => {
                error!(%run_id, node = %node_id, %reason, "process run failed")
            }
            RunOutcome::Cancelled => info!(%run_id, "process run cancelled"),
        }
        ctx.emit(EngineEvent::ProcessCompleted {
            run_id,
            success: outcome.is_success(),
        });
        outcome
    }

    async fn run_loop(&self, ctx: &C, root: &Arc<ProcessNode<C>>, cancel: &CancellationToken) -> RunOutcome {
        let mut pause_rx = self.paused.subscribe();

        loop {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }

            if self.pause_requested() {
                debug!("run loop paused");
                while self.pause_requested() {
                    tokio::select! {
                        _ = cancel.cancelled() => return RunOutcome::Cancelled,
                        changed = pause_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                debug!("run loop resumed");
                continue;
            }

            let Some((node, step)) = root.find_next(ctx) else {
                ctx.set_running(false);
                ctx.set_state("Complete", "Process complete");
                return RunOutcome::Completed;
            };

            let step_cancel = {
                let mut control = self.control();
                control.step_cancel = cancel.child_token();
                control.current = Some(Arc::clone(&node));
                if let Some(label) = node.state_label() {
                    let message = node.message().unwrap_or(node.id()).to_string();
                    control.last_label = Some((label.to_string(), message));
                }
                control.step_cancel.clone()
            };

            if let Some(label) = node.state_label() {
                ctx.set_state(label, node.message().unwrap_or(node.id()));
            }
            ctx.log(&format!("Starting step: {}", step.name()));
            ctx.emit(EngineEvent::StepStarted {
                node_id: node.id().to_string(),
            });

            let result = step.execute(ctx, &step_cancel).await;
            self.control().current = None;

            if cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            match result {
                Ok(()) => {}
                Err(StepError::Cancelled) if step_cancel.is_cancelled() => {
                    ctx.log(&format!("Step skipped: {}", step.name()));
                }
                Err(e) => {
                    let reason = e.to_string();
                    ctx.set_error(true);
                    ctx.set_running(false);
                    ctx.set_state("Error", &reason);
                    ctx.log(&format!("Step failed: {}: {reason}", step.name()));
                    return RunOutcome::Failed {
                        node_id: node.id().to_string(),
                        reason,
                    };
                }
            }

            // `stop` cancels under the same lock, so no flag lands after its clear_flags
            let marked = {
                let _control = self.control();
                let live = !cancel.is_cancelled();
                if live {
                    ctx.mark_complete(node.id());
                }
                live
            };
            if !marked {
                return RunOutcome::Cancelled;
            }
            ctx.log(&format!("Step completed: {}", step.name()));
            ctx.emit(EngineEvent::StepCompleted {
                node_id: node.id().to_string(),
            });

            tokio::select! {
                _ = cancel.cancelled() => return RunOutcome::Cancelled,
                _ = tokio::time::sleep(self.loop_interval) => {}
            }
        }
    }

    /// Hold node advancement at the next step boundary.
    ///
    /// Returns false when there is nothing to pause.
    pub fn pause(&self, ctx: &C) -> bool {
        if !ctx.is_running() || ctx.is_paused() {
            return false;
        }
        ctx.set_paused(true);
        self.paused.send_replace(true);
        info!("process paused");
        ctx.set_state("Paused", "Process paused");
        true
    }

    /// Let a paused run continue.
    ///
    /// The state label of the most recently started node is published again.
    /// Returns false when no run is active or it is not paused.
    pub fn resume(&self, ctx: &C) -> bool {
        if !self.is_active() || !ctx.is_paused() {
            return false;
        }
        ctx.set_paused(false);
        self.paused.send_replace(false);
        info!("process resumed");
        let last_label = self.control().last_label.clone();
        if let Some((label, message)) = last_label {
            ctx.set_state(&label, &message);
        }
        true
    }

    /// Cancel the run, clear completion flags and return to `Idle`.
    pub fn stop(&self, ctx: &C) {
        let active = {
            let control = self.control();
            control.cancel.cancel();
            control.active
        };
        if active {
            info!("process stop requested");
        }
        ctx.clear_flags();
        ctx.set_running(false);
        ctx.set_paused(false);
        self.paused.send_replace(false);
        ctx.set_state("Idle", "Process stopped");
    }

    /// Mark the executing node complete and cancel its step.
    ///
    /// Returns the skipped node id, or None if no step is executing.
    pub fn skip_current_step(&self, ctx: &C) -> Option<String> {
        let skipped = {
            let control = self.control();
            let node = control.current.as_ref()?;
            control.step_cancel.cancel();
            node.id().to_string()
        };
        warn!(node = %skipped, "step skipped by operator");
        ctx.mark_complete(&skipped);
        Some(skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct State {
        flags: Vec<String>,
        label: String,
        running: bool,
        paused: bool,
        error: bool,
        executed: Vec<String>,
    }

    struct TestContext {
        state: Mutex<State>,
        events: mpsc::UnboundedSender<EngineEvent>,
    }

    impl TestContext {
        fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
            let (events, rx) = mpsc::unbounded_channel();
            let ctx = Self {
                state: Mutex::new(State {
                    label: "Idle".to_string(),
                    ..State::default()
                }),
                events,
            };
            (ctx, rx)
        }

        fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
            f(&mut self.state.lock().unwrap())
        }

        fn executed(&self) -> Vec<String> {
            self.with(|s| s.executed.clone())
        }
    }

    impl ProcessContext for TestContext {
        fn is_completed(&self, node_id: &str) -> bool {
            self.with(|s| s.flags.iter().any(|id| id == node_id))
        }
        fn mark_complete(&self, node_id: &str) {
            self.with(|s| {
                if !s.flags.iter().any(|id| id == node_id) {
                    s.flags.push(node_id.to_string());
                }
            })
        }
        fn completed_ids(&self) -> Vec<String> {
            self.with(|s| s.flags.clone())
        }
        fn clear_flags(&self) {
            self.with(|s| s.flags.clear())
        }
        fn reset_flags(&self) {
            self.with(|s| {
                s.flags.clear();
                s.running = false;
                s.paused = false;
                s.error = false;
            })
        }
        fn current_state(&self) -> String {
            self.with(|s| s.label.clone())
        }
        fn set_state(&self, state: &str, message: &str) {
            self.with(|s| s.label = state.to_string());
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
                severity: vd_protocol::AlarmSeverity::classify(code),
            });
        }
        fn is_running(&self) -> bool {
            self.with(|s| s.running)
        }
        fn set_running(&self, running: bool) {
            self.with(|s| s.running = running)
        }
        fn is_paused(&self) -> bool {
            self.with(|s| s.paused)
        }
        fn set_paused(&self, paused: bool) {
            self.with(|s| s.paused = paused)
        }
        fn has_error(&self) -> bool {
            self.with(|s| s.error)
        }
        fn set_error(&self, error: bool) {
            self.with(|s| s.error = error)
        }
        fn emit(&self, event: EngineEvent) {
            let _ = self.events.send(event);
        }
    }

    enum Behavior {
        Succeed,
        Fail,
        Wait(Duration),
        FailAfter(Duration),
        /// Sleeps through cancellation and then reports success.
        Oblivious(Duration),
    }

    struct Recorder {
        name: String,
        behavior: Behavior,
    }

    fn recorder(name: &str, behavior: Behavior) -> Recorder {
        Recorder {
            name: name.to_string(),
            behavior,
        }
    }

    #[async_trait]
    impl ProcessStep<TestContext> for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, ctx: &TestContext, cancel: &CancellationToken) -> Result<(), StepError> {
            ctx.with(|s| s.executed.push(self.name.clone()));
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(anyhow::anyhow!("{} broke", self.name).into()),
                Behavior::Wait(d) => tokio::select! {
                    _ = cancel.cancelled() => Err(StepError::Cancelled),
                    _ = tokio::time::sleep(d) => Ok(()),
                },
                Behavior::FailAfter(d) => {
                    tokio::time::sleep(d).await;
                    Err(anyhow::anyhow!("{} broke", self.name).into())
                }
                Behavior::Oblivious(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
            }
        }
    }

    struct Never;

    #[async_trait]
    impl ProcessStep<TestContext> for Never {
        fn name(&self) -> &str {
            "never"
        }
        fn can_execute(&self, _ctx: &TestContext) -> bool {
            false
        }
        async fn execute(&self, _ctx: &TestContext, _cancel: &CancellationToken) -> Result<(), StepError> {
            panic!("ineligible step executed");
        }
    }

    fn leaf(id: &str, behavior: Behavior) -> ProcessNode<TestContext> {
        ProcessNode::new(id).with_step(recorder(id, behavior)).with_state(id.to_uppercase())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_run_without_tree_fails_fast() {
        let engine = ProcessEngine::<TestContext>::new();
        let (ctx, mut rx) = TestContext::new();

        assert_eq!(engine.run(&ctx).await, Err(EngineError::NoProcessTree));
        assert!(!ctx.is_running());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_order_traversal() {
        let engine = ProcessEngine::new();
        let tree = ProcessNode::new("root")
            .add_child(leaf("a", Behavior::Succeed).add_child(leaf("a1", Behavior::Succeed)))
            .add_child(ProcessNode::new("group").add_child(leaf("b", Behavior::Succeed)))
            .add_child(leaf("c", Behavior::Succeed));
        engine.set_process_tree(tree).unwrap();
        let (ctx, mut rx) = TestContext::new();

        let outcome = engine.run(&ctx).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(ctx.executed(), vec!["a", "a1", "b", "c"]);
        assert_eq!(ctx.current_state(), "Complete");
        assert!(!ctx.is_running());
        // Grouping nodes have no step and never get a flag
        let flags: HashSet<_> = ctx.completed_ids().into_iter().collect();
        assert!(!flags.contains("root") && !flags.contains("group"));

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(EngineEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(EngineEvent::ProcessCompleted { success: true, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ineligible_node_is_passed_over() {
        let engine = ProcessEngine::new();
        let tree = ProcessNode::new("root")
            .add_child(ProcessNode::new("gated").with_step(Never).add_child(leaf("inner", Behavior::Succeed)))
            .add_child(leaf("after", Behavior::Succeed));
        engine.set_process_tree(tree).unwrap();
        let (ctx, _rx) = TestContext::new();

        assert_eq!(engine.run(&ctx).await.unwrap(), RunOutcome::Completed);
        assert_eq!(ctx.executed(), vec!["inner", "after"]);
        assert!(!ctx.is_completed("gated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_failure_sets_error() {
        let engine = ProcessEngine::new();
        let tree = ProcessNode::new("root")
            .add_child(leaf("ok", Behavior::Succeed))
            .add_child(leaf("bad", Behavior::Fail))
            .add_child(leaf("unreached", Behavior::Succeed));
        engine.set_process_tree(tree).unwrap();
        let (ctx, mut rx) = TestContext::new();

        let outcome = engine.run(&ctx).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                node_id: "bad".to_string(),
                reason: "bad broke".to_string()
            }
        );
        assert!(ctx.has_error());
        assert!(!ctx.is_running());
        assert_eq!(ctx.current_state(), "Error");
        assert_eq!(ctx.executed(), vec!["ok", "bad"]);
        assert!(!ctx.is_completed("bad"));

        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::StateChanged {
            state: "Error".to_string(),
            message: "bad broke".to_string()
        }));
        assert!(matches!(
            events.last(),
            Some(EngineEvent::ProcessCompleted { success: false, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_rejected_while_active() {
        let engine = Arc::new(ProcessEngine::new());
        engine
            .set_process_tree(ProcessNode::new("root").add_child(leaf("slow", Behavior::Wait(Duration::from_secs(10)))))
            .unwrap();
        let ctx = Arc::new(TestContext::new().0);

        let handle = {
            let (engine, ctx) = (Arc::clone(&engine), Arc::clone(&ctx));
            tokio::spawn(async move { engine.run(&ctx).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(engine.run(&ctx).await, Err(EngineError::AlreadyRunning));
        assert!(engine.set_process_tree(ProcessNode::new("other")).is_err());
        assert!(ctx.is_running());

        assert_eq!(handle.await.unwrap(), Ok(RunOutcome::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_run_claims_the_engine_before_polling() {
        let engine = Arc::new(ProcessEngine::new().with_process_tree(
            ProcessNode::new("root").add_child(leaf("slow", Behavior::Wait(Duration::from_secs(10)))),
        ));
        let ctx = Arc::new(TestContext::new().0);

        let handle = engine.spawn_run(Arc::clone(&ctx)).unwrap();
        // No yield in between: the spawned task has not run yet
        assert!(matches!(
            engine.spawn_run(Arc::clone(&ctx)),
            Err(EngineError::AlreadyRunning)
        ));
        assert!(engine.is_active());

        engine.stop(&ctx);
        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_while_paused_ends_unpaused() {
        let engine = Arc::new(ProcessEngine::new().with_process_tree(
            ProcessNode::new("root")
                .add_child(leaf("bad", Behavior::FailAfter(Duration::from_secs(1))))
                .add_child(leaf("unreached", Behavior::Succeed)),
        ));
        let ctx = Arc::new(TestContext::new().0);

        let handle = engine.spawn_run(Arc::clone(&ctx)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(engine.pause(&ctx));

        let outcome = handle.await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed { ref node_id, .. } if node_id == "bad"));
        assert!(!ctx.is_paused());
        assert!(!engine.resume(&ctx), "nothing to resume after a failure");
        assert_eq!(ctx.current_state(), "Error");
        assert!(ctx.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_step_that_ignores_cancel_leaves_no_flag() {
        let engine = Arc::new(ProcessEngine::new().with_process_tree(
            ProcessNode::new("root").add_child(leaf("valve", Behavior::Oblivious(Duration::from_secs(2)))),
        ));
        let ctx = Arc::new(TestContext::new().0);

        let handle = engine.spawn_run(Arc::clone(&ctx)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        engine.stop(&ctx);

        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);
        assert!(ctx.completed_ids().is_empty());
        assert!(!ctx.is_completed("valve"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_without_error() {
        let engine = Arc::new(ProcessEngine::new());
        engine
            .set_process_tree(
                ProcessNode::new("root")
                    .add_child(leaf("first", Behavior::Succeed))
                    .add_child(leaf("slow", Behavior::Wait(Duration::from_secs(60)))),
            )
            .unwrap();
        let ctx = Arc::new(TestContext::new().0);

        let handle = {
            let (engine, ctx) = (Arc::clone(&engine), Arc::clone(&ctx));
            tokio::spawn(async move { engine.run(&ctx).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.current_node_id().as_deref(), Some("slow"));

        engine.stop(&ctx);

        assert_eq!(handle.await.unwrap(), Ok(RunOutcome::Cancelled));
        assert!(!ctx.has_error());
        assert!(!ctx.is_running());
        assert!(ctx.completed_ids().is_empty());
        assert_eq!(ctx.current_state(), "Idle");
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_next_node_until_resume() {
        let engine = Arc::new(ProcessEngine::new());
        engine
            .set_process_tree(
                ProcessNode::new("root")
                    .add_child(leaf("one", Behavior::Wait(Duration::from_secs(1))))
                    .add_child(leaf("two", Behavior::Succeed)),
            )
            .unwrap();
        let ctx = Arc::new(TestContext::new().0);

        let handle = {
            let (engine, ctx) = (Arc::clone(&engine), Arc::clone(&ctx));
            tokio::spawn(async move { engine.run(&ctx).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(engine.pause(&ctx));
        assert!(!engine.pause(&ctx), "pausing twice has no effect");
        assert_eq!(ctx.current_state(), "Paused");

        // The step in progress finishes; the next one does not start
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctx.executed(), vec!["one"]);
        assert!(ctx.is_completed("one"));

        assert!(engine.resume(&ctx));
        assert_eq!(ctx.current_state(), "ONE");
        assert_eq!(handle.await.unwrap(), Ok(RunOutcome::Completed));
        assert_eq!(ctx.executed(), vec!["one", "two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_paused() {
        let engine = Arc::new(ProcessEngine::new());
        engine
            .set_process_tree(
                ProcessNode::new("root")
                    .add_child(leaf("one", Behavior::Succeed))
                    .add_child(leaf("two", Behavior::Succeed)),
            )
            .unwrap();
        let ctx = Arc::new(TestContext::new().0);
        ctx.set_running(true);
        engine.pause(&ctx);

        let handle = {
            let (engine, ctx) = (Arc::clone(&engine), Arc::clone(&ctx));
            tokio::spawn(async move { engine.run(&ctx).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        // run() clears the pause left from before the run
        assert_eq!(ctx.executed(), vec!["one"]);

        engine.pause(&ctx);
        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.stop(&ctx);

        assert_eq!(handle.await.unwrap(), Ok(RunOutcome::Cancelled));
        assert_eq!(ctx.executed(), vec!["one"]);
        assert!(!ctx.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_current_step() {
        let engine = Arc::new(ProcessEngine::new());
        engine
            .set_process_tree(
                ProcessNode::new("root")
                    .add_child(leaf("stuck", Behavior::Wait(Duration::from_secs(3600))))
                    .add_child(leaf("next", Behavior::Succeed)),
            )
            .unwrap();
        let ctx = Arc::new(TestContext::new().0);

        assert_eq!(engine.skip_current_step(&ctx), None);

        let handle = {
            let (engine, ctx) = (Arc::clone(&engine), Arc::clone(&ctx));
            tokio::spawn(async move { engine.run(&ctx).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(engine.skip_current_step(&ctx).as_deref(), Some("stuck"));
        assert_eq!(handle.await.unwrap(), Ok(RunOutcome::Completed));
        assert_eq!(ctx.executed(), vec!["stuck", "next"]);
        assert!(!ctx.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_visits_same_sequence() {
        let engine = ProcessEngine::new();
        engine
            .set_process_tree(
                ProcessNode::new("root")
                    .add_child(leaf("x", Behavior::Succeed))
                    .add_child(leaf("y", Behavior::Succeed)),
            )
            .unwrap();
        let (ctx, _rx) = TestContext::new();

        engine.run(&ctx).await.unwrap();
        let first = ctx.executed();
        ctx.with(|s| s.executed.clear());
        engine.run(&ctx).await.unwrap();

        assert_eq!(ctx.executed(), first);
    }
}
