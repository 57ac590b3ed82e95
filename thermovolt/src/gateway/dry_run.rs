//! Gateways that only log, for observing the loop on a live rig without
//! touching voltages or restarting.

use async_trait::async_trait;

use super::{Actuator, Restarter};
use crate::error::Result;
use crate::instruction::{self, Instruction};
use crate::tracing::prelude::*;

pub struct DryRunActuator;

#[async_trait]
impl Actuator for DryRunActuator {
    async fn apply(&self, batch: &[Instruction]) -> Result<()> {
        if !batch.is_empty() {
            info!(args = %instruction::to_args(batch).join(" "), "Dry run: actuation skipped");
        }
        Ok(())
    }
}

pub struct DryRunRestarter;

#[async_trait]
impl Restarter for DryRunRestarter {
    async fn reboot(&self) -> Result<()> {
        warn!("Dry run: host restart skipped");
        Ok(())
    }
}
