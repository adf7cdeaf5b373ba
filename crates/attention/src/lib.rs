//! Attention Monitor
//!
//! Background presence monitoring with a debounced status:
//! - A sampling loop reads frames and runs face detection on its own thread
//! - An asymmetric hysteresis filter turns presence into focused/distracted
//! - The status is published as one snapshot, readable from any thread
//! - Idempotent start/stop with guaranteed camera release

pub mod config;
pub mod monitor;
pub mod state;
mod worker;

pub use config::{AppConfig, LoggingConfig, MonitorConfig};
pub use monitor::{Monitor, MonitorHealth, MonitorSnapshot};
pub use state::{AttentionStatus, AttentionTracker};

use std::time::Duration;

use camera_capture::CameraError;
use face_detect::DetectorError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Face detector unavailable: {0}")]
    DetectorUnavailable(#[source] DetectorError),

    #[error("No camera available: {0}")]
    NoDeviceAvailable(#[source] CameraError),

    #[error("Previous sampling loop has not exited yet")]
    Busy,

    #[error("Sampling loop did not exit within {0:?}")]
    StopTimedOut(Duration),

    #[error("Failed to spawn sampling thread: {0}")]
    Spawn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<(), MonitorError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| MonitorError::Config(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| MonitorError::Config(format!("Failed to set tracing subscriber: {e}")))
}
