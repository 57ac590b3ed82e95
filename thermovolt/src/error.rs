//! Error types for the controller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected at load time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No controllable device survived allow-list filtering.
    #[error("no controllable devices available")]
    NoDevices,

    /// Telemetry query could not be executed or parsed.
    #[error("telemetry query failed: {0}")]
    Telemetry(String),

    /// Actuation batch was rejected by the external tool.
    #[error("actuation failed: {0}")]
    Actuation(String),

    /// Host restart could not be issued.
    #[error("restart failed: {0}")]
    Restart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
