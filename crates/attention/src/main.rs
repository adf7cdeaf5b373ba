//! Attention Monitor - Main Entry Point
//!
//! Usage: `attention-monitor [config.toml]`
//!
//! Replays recorded camera frames through the face detector and prints a JSON
//! snapshot to stdout every time the attention status changes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use attention::{init_logging, AppConfig, Monitor, MonitorHealth};
use camera_capture::ReplaySource;
use face_detect::OnnxFaceDetector;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let app = AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    init_logging(&app.logging)?;

    info!("=== Attention Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Replaying camera frames from {}", app.replay_root.display());

    let source = ReplaySource::new(&app.replay_root);
    let detector = OnnxFaceDetector::new(app.monitor.detector.clone());
    let monitor = Arc::new(Monitor::new(app.monitor.clone(), source, detector)?);
    let mut updates = monitor.subscribe();

    // Model loading and device probing block
    let starter = Arc::clone(&monitor);
    tokio::task::spawn_blocking(move || starter.start())
        .await?
        .context("failed to start attention monitor")?;

    let mut last_status = monitor.status();
    info!("Initial status: {}", last_status);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.status != last_status {
                    last_status = snapshot.status;
                    println!("{}", serde_json::to_string(&snapshot)?);
                }
                if snapshot.health == MonitorHealth::Unavailable {
                    warn!("Camera stopped delivering frames, shutting down");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    let stopper = Arc::clone(&monitor);
    tokio::task::spawn_blocking(move || stopper.stop())
        .await?
        .context("failed to stop attention monitor")?;

    Ok(())
}
