//! Actuation via `nvidiaInspector` command-line directives.

use async_trait::async_trait;
use tokio::process::Command;

use super::Actuator;
use crate::error::{Error, Result};
use crate::instruction::{self, Instruction};
use crate::tracing::prelude::*;

/// Runs the inspector tool once per batch, one argument per directive.
pub struct Inspector {
    command: String,
}

impl Inspector {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Actuator for Inspector {
    async fn apply(&self, batch: &[Instruction]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let args = instruction::to_args(batch);
        info!(command = %self.command, args = %args.join(" "), "Applying actuation batch");

        let status = Command::new(&self.command).args(&args).status().await?;
        if !status.success() {
            return Err(Error::Actuation(format!(
                "{} exited with {status}",
                self.command
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_not_run_tool_for_empty_batch() {
        let inspector = Inspector::new("/nonexistent/nvidiaInspector");

        inspector.apply(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn should_fail_when_tool_cannot_run() {
        let inspector = Inspector::new("/nonexistent/nvidiaInspector");
        let batch = [Instruction::LockVoltage {
            device: 0,
            microvolts: 850_000,
        }];

        assert!(inspector.apply(&batch).await.is_err());
    }
}
