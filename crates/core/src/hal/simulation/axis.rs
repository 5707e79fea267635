//! Simulated servo axis.

use crate::hal::{Axis, HalError, HalResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vd_protocol::axis_models::AxisState;

/// Interpolation period of simulated moves.
pub const MOVE_TICK: Duration = Duration::from_millis(50);

/// Velocity used for homing moves.
pub const HOMING_VELOCITY: f64 = 50.0;

/// Software limit switches trigger at +/- this position.
pub const LIMIT_POSITION: f64 = 500.0;

const MOVING_TORQUE: f64 = 30.0;

// A panic while holding the lock leaves plain data behind; keep using it.
fn lock(inner: &Mutex<AxisInner>) -> MutexGuard<'_, AxisInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct AxisInner {
    position: f64,
    target_position: f64,
    velocity: f64,
    enabled: bool,
    homed: bool,
    moving: bool,
    homing: bool,
    alarm: Option<String>,
    pending_fault: Option<String>,
    /// Cancelled by stop/emergency stop to interrupt the move in progress.
    motion: CancellationToken,
    /// Incremented by every accepted motion command.
    generation: u64,
}

struct Motion {
    start: f64,
    token: CancellationToken,
    generation: u64,
}

/// Axis whose position follows commanded moves in virtual time.
///
/// Position is interpolated every [`MOVE_TICK`] toward the target at the
/// commanded velocity. A cancelled or stopped move leaves the axis where it
/// was when the interruption was observed.
pub struct SimulatedAxis {
    id: usize,
    name: String,
    inner: Arc<Mutex<AxisInner>>,
    motion_commands: AtomicUsize,
}

impl SimulatedAxis {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            inner: Arc::new(Mutex::new(AxisInner {
                position: 0.0,
                target_position: 0.0,
                velocity: 0.0,
                enabled: false,
                homed: false,
                moving: false,
                homing: false,
                alarm: None,
                pending_fault: None,
                motion: CancellationToken::new(),
                generation: 0,
            })),
            motion_commands: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AxisInner> {
        lock(&self.inner)
    }

    /// Teleport the axis. Used to set up misalignment in tests.
    pub fn set_position(&self, position: f64) {
        let mut inner = self.lock();
        inner.position = position;
        inner.target_position = position;
    }

    /// Make the next motion command fail with an axis fault.
    pub fn inject_fault(&self, reason: impl Into<String>) {
        self.lock().pending_fault = Some(reason.into());
    }

    /// Number of move, home and jog commands accepted so far.
    pub fn motion_commands(&self) -> usize {
        self.motion_commands.load(Ordering::SeqCst)
    }

    /// Validate a motion command and mark the axis as moving.
    ///
    /// A new command supersedes the one in progress.
    fn begin_motion(&self, target: f64, velocity: f64, homing: bool) -> HalResult<Motion> {
        let mut inner = self.lock();
        if let Some(reason) = inner.pending_fault.take() {
            inner.alarm = Some(reason.clone());
            return Err(HalError::AxisFault {
                axis: self.name.clone(),
                reason,
            });
        }
        if let Some(reason) = &inner.alarm {
            return Err(HalError::AxisFault {
                axis: self.name.clone(),
                reason: reason.clone(),
            });
        }
        if !inner.enabled {
            return Err(HalError::NotEnabled {
                axis: self.name.clone(),
            });
        }
        if !(velocity.is_finite() && velocity > 0.0) {
            return Err(HalError::AxisFault {
                axis: self.name.clone(),
                reason: format!("invalid velocity {velocity}"),
            });
        }

        self.motion_commands.fetch_add(1, Ordering::SeqCst);
        inner.motion.cancel();
        inner.motion = CancellationToken::new();
        inner.generation += 1;
        inner.target_position = target;
        inner.velocity = velocity;
        inner.moving = true;
        inner.homing = homing;
        Ok(Motion {
            start: inner.position,
            token: inner.motion.clone(),
            generation: inner.generation,
        })
    }

    fn end_motion(&self, generation: u64, final_position: Option<f64>) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        if let Some(position) = final_position {
            inner.position = position;
        }
        inner.moving = false;
        inner.homing = false;
        inner.velocity = 0.0;
    }

    async fn run_move(&self, target: f64, velocity: f64, homing: bool, cancel: &CancellationToken) -> HalResult<()> {
        let Motion {
            start,
            token: motion,
            generation,
        } = self.begin_motion(target, velocity, homing)?;
        debug!(axis = %self.name, from = start, to = target, velocity, "move started");

        let distance = target - start;
        let duration_ms = distance.abs() / velocity * 1000.0;
        let steps = (duration_ms / MOVE_TICK.as_millis() as f64) as usize;
        let step_size = distance / steps.max(1) as f64;

        for i in 0..steps {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.end_motion(generation, None);
                    debug!(axis = %self.name, "move cancelled");
                    return Err(HalError::Cancelled);
                }
                _ = motion.cancelled() => {
                    self.end_motion(generation, None);
                    debug!(axis = %self.name, "move interrupted by stop");
                    return Err(HalError::Cancelled);
                }
                _ = tokio::time::sleep(MOVE_TICK) => {
                    self.lock().position = start + step_size * (i + 1) as f64;
                }
            }
        }

        self.end_motion(generation, Some(target));
        debug!(axis = %self.name, position = target, "move finished");
        Ok(())
    }
}

#[async_trait]
impl Axis for SimulatedAxis {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> f64 {
        self.lock().position
    }

    fn target_position(&self) -> f64 {
        self.lock().target_position
    }

    fn velocity(&self) -> f64 {
        self.lock().velocity
    }

    fn torque(&self) -> f64 {
        if self.lock().moving {
            MOVING_TORQUE
        } else {
            0.0
        }
    }

    fn state(&self) -> AxisState {
        let inner = self.lock();
        if inner.alarm.is_some() {
            AxisState::Alarm
        } else if inner.homing {
            AxisState::Homing
        } else if inner.moving {
            AxisState::Moving
        } else if inner.enabled {
            AxisState::Enabled
        } else {
            AxisState::Disabled
        }
    }

    fn is_moving(&self) -> bool {
        self.lock().moving
    }

    fn is_homed(&self) -> bool {
        self.lock().homed
    }

    fn positive_limit(&self) -> bool {
        self.lock().position >= LIMIT_POSITION
    }

    fn negative_limit(&self) -> bool {
        self.lock().position <= -LIMIT_POSITION
    }

    async fn enable(&self) -> HalResult<()> {
        self.lock().enabled = true;
        debug!(axis = %self.name, "enabled");
        Ok(())
    }

    async fn disable(&self) -> HalResult<()> {
        let mut inner = self.lock();
        inner.motion.cancel();
        inner.enabled = false;
        debug!(axis = %self.name, "disabled");
        Ok(())
    }

    async fn home(&self, cancel: &CancellationToken) -> HalResult<()> {
        self.run_move(0.0, HOMING_VELOCITY, true, cancel).await?;
        self.lock().homed = true;
        Ok(())
    }

    async fn move_absolute(&self, position: f64, velocity: f64, cancel: &CancellationToken) -> HalResult<()> {
        self.run_move(position, velocity, false, cancel).await
    }

    async fn move_relative(&self, distance: f64, velocity: f64, cancel: &CancellationToken) -> HalResult<()> {
        let target = self.position() + distance;
        self.run_move(target, velocity, false, cancel).await
    }

    async fn jog(&self, velocity: f64) -> HalResult<()> {
        let limit = if velocity < 0.0 { -LIMIT_POSITION } else { LIMIT_POSITION };
        let motion = self.begin_motion(limit, velocity.abs(), false)?.token;
        let inner = Arc::clone(&self.inner);
        let step = velocity * MOVE_TICK.as_secs_f64();
        debug!(axis = %self.name, velocity, "jog started");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = motion.cancelled() => break,
                    _ = tokio::time::sleep(MOVE_TICK) => {
                        let mut guard = lock(&inner);
                        guard.position = (guard.position + step).clamp(-LIMIT_POSITION, LIMIT_POSITION);
                    }
                }
            }
        });
        Ok(())
    }

    async fn stop(&self) -> HalResult<()> {
        let mut inner = self.lock();
        inner.motion.cancel();
        inner.moving = false;
        inner.homing = false;
        inner.velocity = 0.0;
        debug!(axis = %self.name, "stopped");
        Ok(())
    }

    async fn emergency_stop(&self) -> HalResult<()> {
        let mut inner = self.lock();
        inner.motion.cancel();
        inner.moving = false;
        inner.homing = false;
        inner.velocity = 0.0;
        warn!(axis = %self.name, "emergency stop");
        Ok(())
    }

    async fn clear_alarm(&self) -> HalResult<()> {
        let mut inner = self.lock();
        inner.alarm = None;
        inner.pending_fault = None;
        Ok(())
    }
}
