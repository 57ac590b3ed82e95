//! Voltage controller daemon.
//!
//! Usage: `thermovoltd [CONFIG]`. The configuration path may also be given
//! in `THERMOVOLT_CONFIG`; with neither, built-in defaults are used.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use thermovolt::config::ControllerConfig;
use thermovolt::daemon::{Daemon, Exit};
use thermovolt::gateway::dry_run::{DryRunActuator, DryRunRestarter};
use thermovolt::gateway::inspector::Inspector;
use thermovolt::gateway::nvidia_smi::NvidiaSmi;
use thermovolt::gateway::restart::CommandRestarter;
use thermovolt::gateway::{Actuator, Restarter};
use thermovolt::registry;
use thermovolt::tracing::prelude::*;

fn config_path() -> Option<PathBuf> {
    env::args_os()
        .nth(1)
        .or_else(|| env::var_os("THERMOVOLT_CONFIG"))
        .map(PathBuf::from)
}

fn load_config() -> Result<ControllerConfig> {
    match config_path() {
        Some(path) => ControllerConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            info!("No config file given, using built-in defaults");
            Ok(ControllerConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    thermovolt::tracing::init();

    let config = load_config()?;

    let telemetry = Arc::new(NvidiaSmi::new(config.telemetry_command.clone()));
    let (actuator, restarter): (Arc<dyn Actuator>, Arc<dyn Restarter>) = if config.dry_run {
        warn!("Dry run: voltages and clocks will not be changed");
        (Arc::new(DryRunActuator), Arc::new(DryRunRestarter))
    } else {
        (
            Arc::new(Inspector::new(config.actuator_command.clone())),
            Arc::new(CommandRestarter::new(config.restart_command.clone())),
        )
    };

    let all_devices = registry::discover(telemetry.as_ref())
        .await
        .context("failed to list devices")?;
    let devices = match registry::resolve_nonempty(&all_devices, &config.devices) {
        Ok(devices) => devices,
        Err(e) => {
            error!(available = ?all_devices, allowed = ?config.devices, "{e}");
            eprintln!("No GPU available");
            std::process::exit(1);
        }
    };

    let mut daemon = Daemon::new(config, devices, telemetry, actuator, restarter);

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        }
    });

    match daemon.run(cancellation).await? {
        Exit::Restarted(trip) => info!(trip = %trip, "Host restart issued, controller exiting"),
        Exit::Cancelled => info!("Interrupted"),
    }

    Ok(())
}
