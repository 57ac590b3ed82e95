//! Closed-loop voltage control for GPU rigs.
//!
//! Each controlled device's supply voltage is nudged every tick toward the
//! value that holds it at a target temperature. Hard limits on temperature
//! and power draw restart the host. After a settle period, clock offsets are
//! applied once.

pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod gateway;
pub mod instruction;
pub mod registry;
pub mod sample;
pub mod tracing;
pub mod tuning;
