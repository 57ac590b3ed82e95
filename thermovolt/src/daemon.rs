//! Single-actor event loop driving the voltage loop and the tuning timer.
//!
//! Two timers share one task: the recurring control tick and the one-shot
//! clock offset tuning. Whichever is due first runs to completion before
//! the other is considered, so the actuator only ever sees one complete
//! batch at a time and tracked voltages need no locking.
//!
//! ```text
//!   start ──► tick ──► (interval) ──► tick ──► ... ──► failsafe ──► restart
//!     │
//!     └──► (tuning delay) ──► clock offsets, once
//! ```

use std::sync::Arc;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::control::{ControlLoop, FailsafeTrip, TickOutcome};
use crate::error::Result;
use crate::gateway::{Actuator, Restarter, TelemetrySource};
use crate::tracing::prelude::*;
use crate::tuning::DeferredTuning;

/// Why [`Daemon::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A failsafe tripped and the host restart was issued.
    Restarted(FailsafeTrip),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Tick,
    Tuning,
}

pub struct Daemon {
    control: ControlLoop,
    tuning: DeferredTuning,
    actuator: Arc<dyn Actuator>,
    tick_interval: time::Duration,
}

impl Daemon {
    pub fn new(
        config: ControllerConfig,
        devices: Vec<u32>,
        telemetry: Arc<dyn TelemetrySource>,
        actuator: Arc<dyn Actuator>,
        restarter: Arc<dyn Restarter>,
    ) -> Self {
        let config = Arc::new(config);
        let tuning = DeferredTuning::new(
            config.tuning_delay(),
            devices.clone(),
            config.base_clock_offset_mhz.clone(),
            config.memory_clock_offset_mhz.clone(),
        );
        let tick_interval = config.tick_interval();
        let control = ControlLoop::new(config, devices, telemetry, actuator.clone(), restarter);

        Self {
            control,
            tuning,
            actuator,
            tick_interval,
        }
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn tuning(&self) -> &DeferredTuning {
        &self.tuning
    }

    /// Run until a failsafe restarts the host or `cancellation` fires.
    ///
    /// The first tick runs immediately. Each following tick is armed only
    /// after the previous one finished, so gateway latency delays the
    /// schedule rather than piling up ticks.
    pub async fn run(&mut self, cancellation: CancellationToken) -> Result<Exit> {
        let started = Instant::now();
        let mut next_tick = started;
        let mut tuning_due = (!self.tuning.has_fired()).then(|| started + self.tuning.delay());

        info!(
            devices = ?self.control.devices(),
            tick_interval = ?self.tick_interval,
            tuning_delay = ?self.tuning.delay(),
            "Voltage controller started"
        );

        loop {
            // The tuning timer was armed first, so it wins a tie.
            let (timer, deadline) = match tuning_due {
                Some(due) if due <= next_tick => (Timer::Tuning, due),
                _ => (Timer::Tick, next_tick),
            };

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("Voltage controller stopped");
                    return Ok(Exit::Cancelled);
                }
                _ = time::sleep_until(deadline) => {}
            }

            match timer {
                Timer::Tuning => {
                    tuning_due = None;
                    if let Err(e) = self.tuning.fire(self.actuator.as_ref()).await {
                        error!(error = %e, "Failed to apply clock offsets");
                    }
                }
                Timer::Tick => {
                    if let TickOutcome::Tripped(trip) = self.control.tick().await? {
                        return Ok(Exit::Restarted(trip));
                    }
                    next_tick = Instant::now() + self.tick_interval;
                }
            }
        }
    }
}
