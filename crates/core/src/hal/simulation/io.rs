//! Simulated digital I/O banks.

use crate::hal::{DigitalIo, HalError, HalResult};
use std::sync::Mutex;
use tracing::trace;

/// Channels per bank on the simulated card.
pub const CHANNEL_COUNT: usize = 16;

#[derive(Debug, Default)]
struct Banks {
    inputs: Vec<bool>,
    outputs: Vec<bool>,
}

/// In-memory input and output banks.
///
/// Outputs keep whatever was last written. Inputs only change through
/// [`SimulatedDigitalIo::simulate_input`].
#[derive(Debug)]
pub struct SimulatedDigitalIo {
    banks: Mutex<Banks>,
}

impl Default for SimulatedDigitalIo {
    fn default() -> Self {
        Self::new(CHANNEL_COUNT, CHANNEL_COUNT)
    }
}

impl SimulatedDigitalIo {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            banks: Mutex::new(Banks {
                inputs: vec![false; inputs],
                outputs: vec![false; outputs],
            }),
        }
    }

    fn with_banks<T>(&self, f: impl FnOnce(&mut Banks) -> T) -> T {
        let mut banks = self.banks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut banks)
    }

    /// Drive an input channel as if a sensor changed.
    pub fn simulate_input(&self, channel: usize, value: bool) -> HalResult<()> {
        self.with_banks(|banks| {
            let slot = banks
                .inputs
                .get_mut(channel)
                .ok_or(HalError::ChannelOutOfRange(channel))?;
            *slot = value;
            Ok(())
        })
    }
}

impl DigitalIo for SimulatedDigitalIo {
    fn read_input(&self, channel: usize) -> HalResult<bool> {
        self.with_banks(|banks| {
            banks
                .inputs
                .get(channel)
                .copied()
                .ok_or(HalError::ChannelOutOfRange(channel))
        })
    }

    fn read_all_inputs(&self) -> Vec<bool> {
        self.with_banks(|banks| banks.inputs.clone())
    }

    fn write_output(&self, channel: usize, value: bool) -> HalResult<()> {
        self.with_banks(|banks| {
            let slot = banks
                .outputs
                .get_mut(channel)
                .ok_or(HalError::ChannelOutOfRange(channel))?;
            *slot = value;
            trace!(channel, value, "output written");
            Ok(())
        })
    }

    fn read_output(&self, channel: usize) -> HalResult<bool> {
        self.with_banks(|banks| {
            banks
                .outputs
                .get(channel)
                .copied()
                .ok_or(HalError::ChannelOutOfRange(channel))
        })
    }

    fn read_all_outputs(&self) -> Vec<bool> {
        self.with_banks(|banks| banks.outputs.clone())
    }
}
