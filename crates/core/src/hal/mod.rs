//! Hardware contract consumed by the process core.
//!
//! The core never talks to a motion SDK directly. It consumes three traits:
//! - [`Axis`]: one servo axis (position, state, motion commands)
//! - [`DigitalIo`]: the digital input/output banks
//! - [`MotionCard`]: the controller card owning the axes and the I/O
//!
//! A vendor driver and the [`simulation`] module both implement the contract.
//! Implementations are responsible for thread-safe access to their own state:
//! status reads may come from any task while a motion command is in flight.

pub mod simulation;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use vd_protocol::axis_models::{AxisState, AxisStatus};

/// Errors reported by the hardware layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalError {
    #[error("Axis {0} does not exist on this card")]
    AxisNotFound(usize),

    #[error("Axis {axis} is not enabled")]
    NotEnabled { axis: String },

    #[error("Axis {axis} fault: {reason}")]
    AxisFault { axis: String, reason: String },

    #[error("Digital I/O channel {0} out of range")]
    ChannelOutOfRange(usize),

    #[error("Motion card provides no digital I/O")]
    NoDigitalIo,

    #[error("Motion card is not connected")]
    NotConnected,

    #[error("Operation cancelled")]
    Cancelled,
}

/// Type alias for Result with HalError.
pub type HalResult<T> = Result<T, HalError>;

/// One servo axis.
///
/// Status accessors read the current hardware state on every call; the core
/// keeps no authoritative cached copy.
#[async_trait]
pub trait Axis: Send + Sync {
    fn id(&self) -> usize;
    fn name(&self) -> &str;

    /// Actual position in user units (mm for the gantry, % for the valve).
    fn position(&self) -> f64;
    fn target_position(&self) -> f64;
    fn velocity(&self) -> f64;
    /// Torque in percent of rated.
    fn torque(&self) -> f64;
    fn state(&self) -> AxisState;
    fn is_moving(&self) -> bool;
    fn is_homed(&self) -> bool;
    fn positive_limit(&self) -> bool;
    fn negative_limit(&self) -> bool;

    /// Collect every status field into one snapshot.
    fn status(&self) -> AxisStatus {
        AxisStatus {
            id: self.id(),
            name: self.name().to_string(),
            position: self.position(),
            target_position: self.target_position(),
            velocity: self.velocity(),
            torque: self.torque(),
            state: self.state(),
            is_moving: self.is_moving(),
            is_homed: self.is_homed(),
            positive_limit: self.positive_limit(),
            negative_limit: self.negative_limit(),
        }
    }

    async fn enable(&self) -> HalResult<()>;
    async fn disable(&self) -> HalResult<()>;
    async fn home(&self, cancel: &CancellationToken) -> HalResult<()>;
    async fn move_absolute(
        &self,
        position: f64,
        velocity: f64,
        cancel: &CancellationToken,
    ) -> HalResult<()>;
    async fn move_relative(
        &self,
        distance: f64,
        velocity: f64,
        cancel: &CancellationToken,
    ) -> HalResult<()>;
    /// Start a continuous move; it runs until [`Axis::stop`].
    async fn jog(&self, velocity: f64) -> HalResult<()>;
    async fn stop(&self) -> HalResult<()>;
    async fn emergency_stop(&self) -> HalResult<()>;
    async fn clear_alarm(&self) -> HalResult<()>;
}

/// Digital input and output banks.
pub trait DigitalIo: Send + Sync {
    fn read_input(&self, channel: usize) -> HalResult<bool>;
    fn read_all_inputs(&self) -> Vec<bool>;
    fn write_output(&self, channel: usize, value: bool) -> HalResult<()>;
    fn read_output(&self, channel: usize) -> HalResult<bool>;
    fn read_all_outputs(&self) -> Vec<bool>;
}

/// A motion controller card.
#[async_trait]
pub trait MotionCard: Send + Sync {
    fn name(&self) -> &str;
    fn is_connected(&self) -> bool;
    fn axis_count(&self) -> usize;

    async fn initialize(&self) -> HalResult<()>;

    /// Handle to axis `id`. Handles are shared; the card keeps ownership.
    fn axis(&self, id: usize) -> HalResult<Arc<dyn Axis>>;
    fn axes(&self) -> Vec<Arc<dyn Axis>>;
    fn digital_io(&self) -> Option<Arc<dyn DigitalIo>>;

    async fn emergency_stop_all(&self) -> HalResult<()>;
    async fn close(&self) -> HalResult<()>;
}
