//! Host restart by running an OS command.

use async_trait::async_trait;
use tokio::process::Command;

use super::Restarter;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

pub struct CommandRestarter {
    argv: Vec<String>,
}

impl CommandRestarter {
    /// `argv[0]` is the program, e.g. `["shutdown", "/r"]` or
    /// `["systemctl", "reboot"]`.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl Restarter for CommandRestarter {
    async fn reboot(&self) -> Result<()> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| Error::Restart("empty restart command".into()))?;

        warn!(command = %self.argv.join(" "), "Restarting host");

        let status = Command::new(program).args(args).status().await?;
        if !status.success() {
            return Err(Error::Restart(format!("{program} exited with {status}")));
        }

        Ok(())
    }
}
