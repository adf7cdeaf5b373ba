//! Monitor and application configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use camera_capture::DEFAULT_CANDIDATE_DEVICES;
use face_detect::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Prefix for environment overrides, e.g. `ATTENTION__MONITOR__SAMPLE_INTERVAL_MS`
pub const ENV_PREFIX: &str = "ATTENTION";

/// Attention monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Continuous absence before status flips to distracted (milliseconds)
    pub distraction_threshold_ms: u64,

    /// Delay between samples (milliseconds)
    pub sample_interval_ms: u64,

    /// Delay after a failed read or detection (milliseconds)
    pub read_backoff_ms: u64,

    /// Device indices probed in order
    pub candidate_devices: Vec<u32>,

    /// Consecutive failed iterations before the loop gives up.
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,

    /// Longest `stop()` waits for the loop to exit (milliseconds).
    /// `None` waits as long as it takes.
    pub stop_timeout_ms: Option<u64>,

    /// Face detector settings
    pub detector: DetectorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            distraction_threshold_ms: 8000,
            sample_interval_ms: 100,
            read_backoff_ms: 100,
            candidate_devices: DEFAULT_CANDIDATE_DEVICES.to_vec(),
            max_consecutive_failures: None,
            stop_timeout_ms: None,
            detector: DetectorConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn distraction_threshold(&self) -> Duration {
        Duration::from_millis(self.distraction_threshold_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the sampling loop cannot run with
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.sample_interval_ms == 0 {
            return Err(MonitorError::Config("sample_interval_ms must be > 0".into()));
        }
        if self.read_backoff_ms == 0 {
            return Err(MonitorError::Config("read_backoff_ms must be > 0".into()));
        }
        if self.candidate_devices.is_empty() {
            return Err(MonitorError::Config("candidate_devices must not be empty".into()));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(MonitorError::Config("max_consecutive_failures must be > 0".into()));
        }
        self.detector
            .validate()
            .map_err(|e| MonitorError::Config(e.to_string()))
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `attention=debug,info`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration of the `attention-monitor` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
    /// Root of the replay devices (`<root>/video<N>/`)
    pub replay_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            replay_root: PathBuf::from("replay"),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional file, then `ATTENTION__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let app: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        app.monitor.validate()?;
        Ok(app)
    }
}
