//! Recording fakes for exercising the controller without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Actuator, Reading, Restarter, TelemetryField, TelemetrySource};
use crate::error::{Error, Result};
use crate::instruction::Instruction;

#[derive(Default)]
pub struct FakeTelemetry {
    rows: Mutex<HashMap<TelemetryField, Vec<Reading>>>,
    failing: Mutex<bool>,
    queries: AtomicUsize,
}

impl FakeTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rows for `field` as `(device index, value)` pairs.
    pub fn set(&self, field: TelemetryField, rows: &[(u32, i64)]) {
        let rows = rows
            .iter()
            .map(|&(device, value)| Reading { device, value })
            .collect();
        self.set_rows(field, rows);
    }

    pub fn set_rows(&self, field: TelemetryField, rows: Vec<Reading>) {
        self.rows.lock().insert(field, rows);
    }

    /// Set temperature and power for devices `0..n` in one go.
    pub fn set_readings(&self, temperatures: &[i64], power_draws: &[i64]) {
        let indexed =
            |values: &[i64]| -> Vec<(u32, i64)> { (0..).zip(values.iter().copied()).collect() };
        self.set(TelemetryField::Temperature, &indexed(temperatures));
        self.set(TelemetryField::PowerDraw, &indexed(power_draws));
    }

    pub fn clear(&self) {
        self.rows.lock().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for FakeTelemetry {
    async fn query(&self, field: TelemetryField) -> Result<Vec<Reading>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(Error::Telemetry("fake telemetry failure".into()));
        }
        Ok(self.rows.lock().get(&field).cloned().unwrap_or_default())
    }
}

/// Records every batch that would have reached the hardware.
#[derive(Default)]
pub struct FakeActuator {
    batches: Mutex<Vec<Vec<Instruction>>>,
    failing: Mutex<bool>,
}

impl FakeActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Instruction>> {
        self.batches.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl Actuator for FakeActuator {
    async fn apply(&self, batch: &[Instruction]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if *self.failing.lock() {
            return Err(Error::Actuation("fake actuator failure".into()));
        }
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRestarter {
    reboots: AtomicUsize,
}

impl FakeRestarter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reboot_count(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Restarter for FakeRestarter {
    async fn reboot(&self) -> Result<()> {
        self.reboots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
