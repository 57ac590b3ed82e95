mod engine;
mod failsafe;
mod voltage;

pub use engine::{ControlLoop, STALE_TELEMETRY_TICKS, TickOutcome};
pub use failsafe::FailsafeTrip;
pub use voltage::{ProportionalController, VoltageUpdate, quantize, quantize_within};
