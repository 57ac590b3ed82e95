use std::sync::Arc;

use super::failsafe::{self, FailsafeTrip};
use super::voltage::ProportionalController;
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::gateway::{Actuator, Restarter, TelemetryField, TelemetrySource};
use crate::instruction::Instruction;
use crate::sample::{self, Sample};
use crate::tracing::prelude::*;

/// Consecutive skipped ticks after which the gap is logged as an error, and
/// again at every further multiple. No failsafe can fire while telemetry is
/// missing.
pub const STALE_TELEMETRY_TICKS: u32 = 5;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable telemetry; nothing changed.
    Skipped,
    /// First tick: start voltages were applied.
    Initialized,
    /// At least one device moved to a new step and the batch was applied.
    Adjusted,
    /// Tracked voltages moved but no device crossed a step boundary.
    Unchanged,
    /// The actuation call failed; tracked voltages were left as they were.
    ActuationFailed,
    /// A hard limit was breached and the host restart was issued.
    Tripped(FailsafeTrip),
}

/// Per-device voltage regulation toward a target temperature.
///
/// Owns the tracked voltage of every controlled device. Each call to
/// [`tick`](Self::tick) samples telemetry, checks the failsafes, and either
/// escalates to a host restart or runs one proportional update.
pub struct ControlLoop {
    config: Arc<ControllerConfig>,
    devices: Vec<u32>,
    controller: ProportionalController,
    telemetry: Arc<dyn TelemetrySource>,
    actuator: Arc<dyn Actuator>,
    restarter: Arc<dyn Restarter>,
    /// Last tracked voltage per position, clamped but not quantized.
    /// `None` until the first tick applies the start voltages.
    voltages_uv: Option<Vec<i64>>,
    skipped_ticks: u32,
}

impl ControlLoop {
    /// `devices` must be non-empty; resolve them with
    /// [`registry::resolve_nonempty`](crate::registry::resolve_nonempty).
    pub fn new(
        config: Arc<ControllerConfig>,
        devices: Vec<u32>,
        telemetry: Arc<dyn TelemetrySource>,
        actuator: Arc<dyn Actuator>,
        restarter: Arc<dyn Restarter>,
    ) -> Self {
        let controller =
            ProportionalController::new(config.proportional_gain, config.voltage_step_uv);
        Self {
            config,
            devices,
            controller,
            telemetry,
            actuator,
            restarter,
            voltages_uv: None,
            skipped_ticks: 0,
        }
    }

    pub fn devices(&self) -> &[u32] {
        &self.devices
    }

    pub fn voltages_uv(&self) -> Option<&[i64]> {
        self.voltages_uv.as_deref()
    }

    /// Ticks skipped in a row for lack of telemetry.
    pub fn skipped_ticks(&self) -> u32 {
        self.skipped_ticks
    }

    #[cfg(test)]
    fn set_voltages_uv(&mut self, voltages_uv: Vec<i64>) {
        self.voltages_uv = Some(voltages_uv);
    }

    /// Run one control iteration.
    ///
    /// Temperatures are read and checked against their limits before power
    /// draw is queried. Only a failed restart is returned as an error.
    /// Telemetry and actuation failures are logged and reported through the
    /// outcome.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let Some(temperatures) = self.read(TelemetryField::Temperature).await else {
            return Ok(self.skip());
        };
        if let Some(trip) = failsafe::check_temperature(&temperatures, &self.devices, &self.config)
        {
            return self.trip(trip).await;
        }

        let Some(power_draws) = self.read(TelemetryField::PowerDraw).await else {
            return Ok(self.skip());
        };
        self.skipped_ticks = 0;

        let sample = Sample::from_parts(&temperatures, &power_draws);
        if let Some(trip) = failsafe::check_power(&sample, &self.devices, &self.config) {
            return self.trip(trip).await;
        }

        let outcome = match self.voltages_uv.take() {
            None => self.initialize().await,
            Some(current) => self.adjust(&sample, current).await,
        };
        Ok(outcome)
    }

    /// Per-position values of `field`, or `None` if this tick has a gap.
    async fn read(&self, field: TelemetryField) -> Option<Vec<i32>> {
        match sample::read(self.telemetry.as_ref(), field, &self.devices).await {
            Ok(Some(values)) => Some(values),
            Ok(None) => {
                debug!(field = %field, "Control tick: no usable telemetry rows");
                None
            }
            Err(e) => {
                warn!(field = %field, error = %e, "Telemetry unavailable, skipping tick");
                None
            }
        }
    }

    fn skip(&mut self) -> TickOutcome {
        self.skipped_ticks = self.skipped_ticks.saturating_add(1);
        if self.skipped_ticks % STALE_TELEMETRY_TICKS == 0 {
            error!(
                skipped_ticks = self.skipped_ticks,
                "No usable telemetry, voltage control and failsafes inactive"
            );
        }
        TickOutcome::Skipped
    }

    async fn trip(&self, trip: FailsafeTrip) -> Result<TickOutcome> {
        error!(trip = ?trip, "Failsafe tripped: {trip}");
        self.restarter.reboot().await?;
        Ok(TickOutcome::Tripped(trip))
    }

    async fn initialize(&mut self) -> TickOutcome {
        let start: Vec<i64> = (0..self.devices.len())
            .map(|position| self.command_uv(position, self.config.start_voltage_uv.get(position)))
            .collect();

        info!(devices = ?self.devices, voltages_uv = ?start, "Applying start voltages");

        if let Err(e) = self.actuator.apply(&self.lock_batch(&start)).await {
            error!(error = %e, "Failed to apply start voltages");
            return TickOutcome::ActuationFailed;
        }

        self.voltages_uv = Some(start);
        TickOutcome::Initialized
    }

    async fn adjust(&mut self, sample: &Sample, current: Vec<i64>) -> TickOutcome {
        let mut next = Vec::with_capacity(current.len());

        for (position, (reading, &device)) in sample.iter().zip(&self.devices).enumerate() {
            let settings = self.config.device(position);
            let current_uv = current[position];
            let update = self.controller.update(
                current_uv,
                settings.target_temperature_c,
                reading.temperature_c,
                settings.min_voltage_uv,
                settings.max_voltage_uv,
            );

            info!(
                device,
                temp_c = reading.temperature_c,
                current_uv,
                error_c = update.error_c,
                delta_uv = update.delta_uv,
                new_uv = update.voltage_uv,
                power_w = reading.power_draw_w,
                power_headroom_w = settings
                    .target_power_draw_w
                    .saturating_sub(reading.power_draw_w),
                "Voltage control tick"
            );

            next.push(update.voltage_uv);
        }

        let quantized: Vec<i64> = next
            .iter()
            .enumerate()
            .map(|(position, &uv)| self.command_uv(position, uv))
            .collect();
        let changed = quantized
            .iter()
            .zip(&current)
            .enumerate()
            .any(|(position, (&new, &old))| new != self.command_uv(position, old));

        if !changed {
            self.voltages_uv = Some(next);
            return TickOutcome::Unchanged;
        }

        if let Err(e) = self.actuator.apply(&self.lock_batch(&quantized)).await {
            error!(error = %e, "Failed to apply voltages, retrying next tick");
            self.voltages_uv = Some(current);
            return TickOutcome::ActuationFailed;
        }

        self.voltages_uv = Some(next);
        TickOutcome::Adjusted
    }

    /// Voltage actually sent for `position`: on the step grid and inside the
    /// device bounds.
    fn command_uv(&self, position: usize, voltage_uv: i64) -> i64 {
        let settings = self.config.device(position);
        self.controller
            .quantize_within(voltage_uv, settings.min_voltage_uv, settings.max_voltage_uv)
    }

    fn lock_batch(&self, voltages_uv: &[i64]) -> Vec<Instruction> {
        self.devices
            .iter()
            .zip(voltages_uv)
            .map(|(&device, &microvolts)| Instruction::LockVoltage { device, microvolts })
            .collect()
    }
}
