//! Motion coordination on top of the hardware contract.

mod dual_z;

pub use dual_z::{AxisIds, DualZController, MotionError, MotionResult, DEFAULT_SYNC_TOLERANCE};
