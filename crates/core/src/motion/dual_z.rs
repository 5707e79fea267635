//! Dual-Z gantry controller.
//!
//! Two linear axes carry the chamber lid and must stay position-synchronized;
//! a third, independent axis drives the throttle valve. Every multi-axis
//! command is issued concurrently and succeeds only if every axis succeeds.

use crate::hal::{Axis, HalError, MotionCard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maximum allowed |Z1 - Z2| before synchronized moves are refused.
pub const DEFAULT_SYNC_TOLERANCE: f64 = 0.1;

/// Errors reported by [`DualZController`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Precondition violation: the gantry axes are misaligned.
    #[error("Z axes out of sync: error {error:.3} exceeds tolerance {tolerance:.3}")]
    SyncError { error: f64, tolerance: f64 },

    #[error("Axis {axis} failed: {source}")]
    Axis {
        axis: String,
        #[source]
        source: HalError,
    },

    #[error("Motion cancelled")]
    Cancelled,
}

/// Type alias for Result with MotionError.
pub type MotionResult<T> = Result<T, MotionError>;

/// Card axis ids used for the gantry and the valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisIds {
    pub z1: usize,
    pub z2: usize,
    pub valve: usize,
}

impl Default for AxisIds {
    fn default() -> Self {
        Self {
            z1: 0,
            z2: 1,
            valve: 2,
        }
    }
}

fn check(axis: &dyn Axis, result: Result<(), HalError>) -> MotionResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(HalError::Cancelled) => Err(MotionError::Cancelled),
        Err(source) => Err(MotionError::Axis {
            axis: axis.name().to_string(),
            source,
        }),
    }
}

/// Fold concurrent results: an axis failure outranks a cancellation.
fn all_ok(results: impl IntoIterator<Item = MotionResult<()>>) -> MotionResult<()> {
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(()) => {}
            Err(MotionError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        Err(MotionError::Cancelled)
    } else {
        Ok(())
    }
}

/// Coordinates the Z1/Z2 gantry pair and the valve axis.
pub struct DualZController {
    z1: Arc<dyn Axis>,
    z2: Arc<dyn Axis>,
    valve: Arc<dyn Axis>,
    sync_tolerance: f64,
}

impl DualZController {
    /// Take the three axis handles from `card`.
    ///
    /// # Errors
    ///
    /// Returns `HalError::AxisNotFound` if the card lacks one of the ids.
    pub fn new(card: &dyn MotionCard, ids: AxisIds) -> Result<Self, HalError> {
        Ok(Self::from_axes(card.axis(ids.z1)?, card.axis(ids.z2)?, card.axis(ids.valve)?))
    }

    pub fn from_axes(z1: Arc<dyn Axis>, z2: Arc<dyn Axis>, valve: Arc<dyn Axis>) -> Self {
        Self {
            z1,
            z2,
            valve,
            sync_tolerance: DEFAULT_SYNC_TOLERANCE,
        }
    }

    pub fn with_sync_tolerance(mut self, tolerance: f64) -> Self {
        self.sync_tolerance = tolerance;
        self
    }

    pub fn z1(&self) -> &Arc<dyn Axis> {
        &self.z1
    }

    pub fn z2(&self) -> &Arc<dyn Axis> {
        &self.z2
    }

    pub fn valve(&self) -> &Arc<dyn Axis> {
        &self.valve
    }

    pub fn sync_tolerance(&self) -> f64 {
        self.sync_tolerance
    }

    pub fn sync_error(&self) -> f64 {
        (self.z1.position() - self.z2.position()).abs()
    }

    pub fn is_sync_ok(&self) -> bool {
        self.sync_error() <= self.sync_tolerance
    }

    /// Current Z1, Z2 and valve positions.
    pub fn positions(&self) -> (f64, f64, f64) {
        (self.z1.position(), self.z2.position(), self.valve.position())
    }

    pub fn is_moving(&self) -> bool {
        self.z1.is_moving() || self.z2.is_moving() || self.valve.is_moving()
    }

    fn all_axes(&self) -> [&Arc<dyn Axis>; 3] {
        [&self.z1, &self.z2, &self.valve]
    }

    pub async fn enable_all(&self) -> MotionResult<()> {
        let (a, b, c) = tokio::join!(self.z1.enable(), self.z2.enable(), self.valve.enable());
        self.fold_three([a, b, c])?;
        info!("all axes enabled");
        Ok(())
    }

    pub async fn disable_all(&self) -> MotionResult<()> {
        let (a, b, c) = tokio::join!(self.z1.disable(), self.z2.disable(), self.valve.disable());
        self.fold_three([a, b, c])?;
        info!("all axes disabled");
        Ok(())
    }

    /// Home Z1 and Z2 together, then the valve.
    pub async fn home_all(&self, cancel: &CancellationToken) -> MotionResult<()> {
        let (a, b) = tokio::join!(self.z1.home(cancel), self.z2.home(cancel));
        all_ok([check(self.z1.as_ref(), a), check(self.z2.as_ref(), b)])?;
        check(self.valve.as_ref(), self.valve.home(cancel).await)?;
        info!("all axes homed");
        Ok(())
    }

    /// Move both Z axes to `position` at `velocity`.
    ///
    /// Refused with [`MotionError::SyncError`] before any axis is commanded
    /// when the pair is out of tolerance.
    pub async fn move_sync(&self, position: f64, velocity: f64, cancel: &CancellationToken) -> MotionResult<()> {
        let error = self.sync_error();
        if error > self.sync_tolerance {
            warn!(error, tolerance = self.sync_tolerance, "synchronized move refused");
            return Err(MotionError::SyncError {
                error,
                tolerance: self.sync_tolerance,
            });
        }

        debug!(position, velocity, "synchronized move");
        let (a, b) = tokio::join!(
            self.z1.move_absolute(position, velocity, cancel),
            self.z2.move_absolute(position, velocity, cancel)
        );
        all_ok([check(self.z1.as_ref(), a), check(self.z2.as_ref(), b)])
    }

    /// Drive the valve to `percent` open, clamped to 0..=100.
    pub async fn set_valve(&self, percent: f64, velocity: f64, cancel: &CancellationToken) -> MotionResult<()> {
        let percent = percent.clamp(0.0, 100.0);
        debug!(percent, velocity, "valve move");
        check(self.valve.as_ref(), self.valve.move_absolute(percent, velocity, cancel).await)
    }

    pub async fn stop_all(&self) -> MotionResult<()> {
        let (a, b, c) = tokio::join!(self.z1.stop(), self.z2.stop(), self.valve.stop());
        self.fold_three([a, b, c])
    }

    /// Best effort: individual failures are logged and otherwise ignored.
    pub async fn emergency_stop_all(&self) {
        let (a, b, c) = tokio::join!(
            self.z1.emergency_stop(),
            self.z2.emergency_stop(),
            self.valve.emergency_stop()
        );
        for (axis, result) in self.all_axes().into_iter().zip([a, b, c]) {
            if let Err(e) = result {
                warn!(axis = axis.name(), error = %e, "emergency stop failed");
            }
        }
    }

    fn fold_three(&self, results: [Result<(), HalError>; 3]) -> MotionResult<()> {
        all_ok(
            self.all_axes()
                .into_iter()
                .zip(results)
                .map(|(axis, result)| check(axis.as_ref(), result)),
        )
    }
}
