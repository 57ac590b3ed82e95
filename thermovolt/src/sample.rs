//! Per-tick telemetry snapshot, aligned to device position.

use crate::error::{Error, Result};
use crate::gateway::{Reading, TelemetryField, TelemetrySource};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReading {
    pub temperature_c: i32,
    pub power_draw_w: i32,
}

/// Readings for every controlled device, indexed by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample(Vec<DeviceReading>);

impl Sample {
    pub fn new(readings: Vec<DeviceReading>) -> Self {
        Self(readings)
    }

    /// Pair per-position temperatures with power draws.
    pub fn from_parts(temperatures: &[i32], power_draws: &[i32]) -> Self {
        let readings = temperatures
            .iter()
            .zip(power_draws)
            .map(|(&temperature_c, &power_draw_w)| DeviceReading {
                temperature_c,
                power_draw_w,
            })
            .collect();
        Self(readings)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, position: usize) -> Option<&DeviceReading> {
        self.0.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceReading> {
        self.0.iter()
    }
}

/// Query one field and project it onto `devices`, by position.
///
/// Returns `None` when the source reported no rows, or when a controlled
/// device has no readable row; the caller treats that as a gap. Rows for
/// devices outside `devices` are ignored.
pub async fn read(
    source: &dyn TelemetrySource,
    field: TelemetryField,
    devices: &[u32],
) -> Result<Option<Vec<i32>>> {
    let rows = source.query(field).await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(devices.len());
    for &device in devices {
        match lookup(&rows, device)? {
            Some(value) => values.push(value),
            None => {
                warn!(device, field = %field, "Device missing from telemetry");
                return Ok(None);
            }
        }
    }

    Ok(Some(values))
}
