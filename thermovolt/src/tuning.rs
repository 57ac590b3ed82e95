//! One-shot clock offset tuning, applied once the rig has settled.

use std::time::Duration;

use crate::config::PerDevice;
use crate::error::Result;
use crate::gateway::Actuator;
use crate::instruction::Instruction;
use crate::tracing::prelude::*;

/// Clock offsets applied exactly once, `delay` after startup.
///
/// Independent of the voltage loop: it never reads or writes tracked
/// voltages and only shares the actuator.
#[derive(Debug, Clone)]
pub struct DeferredTuning {
    delay: Duration,
    devices: Vec<u32>,
    base_offsets_mhz: PerDevice<i32>,
    memory_offsets_mhz: PerDevice<i32>,
    fired: bool,
}

impl DeferredTuning {
    pub fn new(
        delay: Duration,
        devices: Vec<u32>,
        base_offsets_mhz: PerDevice<i32>,
        memory_offsets_mhz: PerDevice<i32>,
    ) -> Self {
        Self {
            delay,
            devices,
            base_offsets_mhz,
            memory_offsets_mhz,
            fired: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Base and memory offset for every device, in device order.
    pub fn batch(&self) -> Vec<Instruction> {
        self.devices
            .iter()
            .enumerate()
            .flat_map(|(position, &device)| {
                [
                    Instruction::BaseClockOffset {
                        device,
                        offset_mhz: self.base_offsets_mhz.get(position),
                    },
                    Instruction::MemoryClockOffset {
                        device,
                        offset_mhz: self.memory_offsets_mhz.get(position),
                    },
                ]
            })
            .collect()
    }

    /// Apply the offsets. Later calls do nothing, even if the first one
    /// failed.
    pub async fn fire(&mut self, actuator: &dyn Actuator) -> Result<()> {
        if self.fired {
            return Ok(());
        }
        self.fired = true;

        info!(devices = ?self.devices, "Applying clock offsets");
        actuator.apply(&self.batch()).await
    }
}
