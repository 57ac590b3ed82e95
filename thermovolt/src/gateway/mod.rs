//! Narrow interfaces to the outside world.
//!
//! The control loop never talks to hardware or the OS directly. It reads
//! telemetry through a [`TelemetrySource`], writes through an [`Actuator`]
//! and escalates through a [`Restarter`]. Each call blocks the controller
//! until the external mechanism returns.

pub mod dry_run;
pub mod inspector;
pub mod nvidia_smi;
pub mod restart;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use strum::Display;

use crate::error::Result;
use crate::instruction::Instruction;

/// Telemetry fields understood by the query interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TelemetryField {
    #[strum(serialize = "index")]
    Index,
    #[strum(serialize = "temperature.gpu")]
    Temperature,
    #[strum(serialize = "power.draw")]
    PowerDraw,
}

/// One row of a telemetry query, keyed by hardware device index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub device: u32,
    pub value: i64,
}

/// Source of per-device readings.
///
/// Rows come back one per hardware-visible device. Device indices are not
/// assumed contiguous or sorted.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn query(&self, field: TelemetryField) -> Result<Vec<Reading>>;
}

/// Applies a batch of directives as one external invocation.
///
/// Implementations must treat an empty batch as a no-op and not invoke
/// the underlying mechanism at all.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn apply(&self, batch: &[Instruction]) -> Result<()>;
}

/// Restarts the host.
///
/// On success the host is going down; callers must not schedule further
/// work.
#[async_trait]
pub trait Restarter: Send + Sync {
    async fn reboot(&self) -> Result<()>;
}
