//! Simulated motion card: three axes plus one I/O bank.

use super::{SimulatedAxis, SimulatedDigitalIo};
use crate::hal::{Axis, DigitalIo, HalError, HalResult, MotionCard};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Axis names in id order.
pub const AXIS_NAMES: [&str; 3] = ["Z1", "Z2", "Valve"];

pub struct SimulatedMotionCard {
    axes: Vec<Arc<SimulatedAxis>>,
    io: Arc<SimulatedDigitalIo>,
    connected: AtomicBool,
}

impl Default for SimulatedMotionCard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMotionCard {
    pub fn new() -> Self {
        let axes = AXIS_NAMES
            .iter()
            .enumerate()
            .map(|(id, name)| Arc::new(SimulatedAxis::new(id, *name)))
            .collect();
        Self {
            axes,
            io: Arc::new(SimulatedDigitalIo::default()),
            connected: AtomicBool::new(false),
        }
    }

    /// Concrete handle to an axis, for fault injection and set-up in tests.
    pub fn simulated_axis(&self, id: usize) -> Option<Arc<SimulatedAxis>> {
        self.axes.get(id).cloned()
    }

    /// Concrete handle to the I/O banks.
    pub fn simulated_io(&self) -> Arc<SimulatedDigitalIo> {
        Arc::clone(&self.io)
    }
}

#[async_trait]
impl MotionCard for SimulatedMotionCard {
    fn name(&self) -> &str {
        "Simulated"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn axis_count(&self) -> usize {
        self.axes.len()
    }

    async fn initialize(&self) -> HalResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!(axes = self.axes.len(), "simulated motion card initialized");
        Ok(())
    }

    fn axis(&self, id: usize) -> HalResult<Arc<dyn Axis>> {
        self.axes
            .get(id)
            .map(|axis| Arc::clone(axis) as Arc<dyn Axis>)
            .ok_or(HalError::AxisNotFound(id))
    }

    fn axes(&self) -> Vec<Arc<dyn Axis>> {
        self.axes
            .iter()
            .map(|axis| Arc::clone(axis) as Arc<dyn Axis>)
            .collect()
    }

    fn digital_io(&self) -> Option<Arc<dyn DigitalIo>> {
        Some(Arc::clone(&self.io) as Arc<dyn DigitalIo>)
    }

    async fn emergency_stop_all(&self) -> HalResult<()> {
        warn!("emergency stop on all simulated axes");
        for axis in &self.axes {
            axis.emergency_stop().await?;
        }
        Ok(())
    }

    async fn close(&self) -> HalResult<()> {
        for axis in &self.axes {
            axis.disable().await?;
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
