//! Telemetry via the `nvidia-smi` CSV query interface.

use async_trait::async_trait;
use tokio::process::Command;

use super::{Reading, TelemetryField, TelemetrySource};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

pub struct NvidiaSmi {
    command: String,
}

impl NvidiaSmi {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TelemetrySource for NvidiaSmi {
    async fn query(&self, field: TelemetryField) -> Result<Vec<Reading>> {
        let output = Command::new(&self.command)
            .arg(format!("--query-gpu=index,{field}"))
            .arg("--format=csv,noheader")
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Telemetry(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(field = %field, output = %stdout.trim(), "Telemetry query");
        Ok(parse_rows(&stdout))
    }
}

/// Parse `index, value` rows. Blank lines are ignored.
///
/// Rows without a numeric value (`[N/A]`, `[Not Supported]`) or without an
/// index are dropped, so one unreadable device does not hide the others.
/// Whether a dropped row mattered is decided against the controlled devices
/// by [`sample`](crate::sample).
pub fn parse_rows(output: &str) -> Vec<Reading> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let reading = parse_row(line);
            if reading.is_none() {
                debug!(row = line, "Dropping unreadable telemetry row");
            }
            reading
        })
        .collect()
}

fn parse_row(line: &str) -> Option<Reading> {
    let (index, value) = line.split_once(',')?;
    let device = index.trim().parse::<u32>().ok()?;
    let value = leading_integer(value)?;

    Some(Reading { device, value })
}

/// Integer prefix of a field, so `"123.45 W"` reads as 123.
fn leading_integer(field: &str) -> Option<i64> {
    let field = field.trim();
    let digits_start = usize::from(field.starts_with(['-', '+']));
    let digits_end = field[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(field.len(), |end| digits_start + end);

    if digits_end == digits_start {
        return None;
    }
    field[..digits_end].parse().ok()
}
