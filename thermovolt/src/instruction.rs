//! Actuation directives in the command-line form the actuation tool expects.

use std::fmt;

/// A single actuation directive for one device.
///
/// `Display` renders the exact argument string passed to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Pin the voltage/frequency curve at the given point.
    LockVoltage { device: u32, microvolts: i64 },
    /// Core clock offset for performance state 0.
    BaseClockOffset { device: u32, offset_mhz: i32 },
    /// Memory clock offset for performance state 0.
    MemoryClockOffset { device: u32, offset_mhz: i32 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::LockVoltage { device, microvolts } => {
                write!(f, "-lockVoltagePoint:{device},{microvolts}")
            }
            Instruction::BaseClockOffset { device, offset_mhz } => {
                write!(f, "-setBaseClockOffset:{device},0,{offset_mhz}")
            }
            Instruction::MemoryClockOffset { device, offset_mhz } => {
                write!(f, "-setMemoryClockOffset:{device},0,{offset_mhz}")
            }
        }
    }
}

/// Render a batch as the argument list for one tool invocation.
pub fn to_args(batch: &[Instruction]) -> Vec<String> {
    batch.iter().map(ToString::to_string).collect()
}
