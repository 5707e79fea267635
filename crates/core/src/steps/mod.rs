//! Vacuum process steps.
//!
//! Each step reads the recipe once at its start, drives the hardware through
//! [`VacuumContext`] and scripts the chamber pressure with fixed factors:
//!
//! | step            | factor per tick | until                        |
//! |-----------------|-----------------|------------------------------|
//! | rough vacuum    | x0.9            | pressure <= target           |
//! | fine vacuum k   | x0.95           | duration or <= start pressure|
//! | vacuum break    | x1.5 then x1.2  | 50 000 Pa, then 90 000 Pa    |
//!
//! Timed loops wake every [`POLL_INTERVAL`] and check cancellation each time.

mod chamber;
mod vacuum;

pub use chamber::{CloseChamberStep, OpenChamberStep};
pub use vacuum::{FineVacuumStep, HoldPressureStep, RoughVacuumStep, VacuumBreakStep};

use crate::engine::StepError;
use crate::hal::HalError;
use crate::motion::MotionError;
use crate::state::VacuumContext;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polling period of the timed stage loops.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pressure at which the small break valve has done its part, in Pa.
pub const BREAK_SMALL_VALVE_PRESSURE: f64 = 50_000.0;

/// Pressure at which the chamber counts as vented, in Pa.
pub const BREAK_COMPLETE_PRESSURE: f64 = 90_000.0;

impl From<MotionError> for StepError {
    fn from(e: MotionError) -> Self {
        match e {
            MotionError::Cancelled => StepError::Cancelled,
            other => StepError::Failed(other.into()),
        }
    }
}

impl From<HalError> for StepError {
    fn from(e: HalError) -> Self {
        match e {
            HalError::Cancelled => StepError::Cancelled,
            other => StepError::Failed(other.into()),
        }
    }
}

/// Sleep one poll period unless cancelled first.
async fn tick(cancel: &CancellationToken) -> Result<(), StepError> {
    sleep(POLL_INTERVAL, cancel).await
}

async fn sleep(duration: Duration, cancel: &CancellationToken) -> Result<(), StepError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(StepError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Close every listed output, keeping the first failure.
///
/// Used on exit paths, so all channels are attempted even if one fails.
fn close_outputs(ctx: &VacuumContext, channels: &[usize]) -> Result<(), StepError> {
    let mut first_error = None;
    for &channel in channels {
        if let Err(e) = ctx.write_output(channel, false) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
