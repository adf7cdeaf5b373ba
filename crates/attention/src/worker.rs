//! Sampling loop run on the monitor's background thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use camera_capture::{CameraError, CaptureSession, FrameReader};
use chrono::Utc;
use face_detect::{DetectorError, FaceDetector};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::monitor::{MonitorHealth, MonitorSnapshot};
use crate::{AttentionStatus, AttentionTracker, MonitorConfig};

#[derive(Error, Debug)]
enum SampleFailure {
    #[error("frame read failed: {0}")]
    Read(CameraError),

    #[error("detection failed: {0}")]
    Detect(DetectorError),
}

impl SampleFailure {
    /// Retrying cannot help
    fn is_fatal(&self) -> bool {
        match self {
            SampleFailure::Read(e) => !e.is_transient(),
            SampleFailure::Detect(e) => e.is_fatal(),
        }
    }
}

/// Consecutive failed samples; saturates at `u32::MAX`
#[derive(Debug, Default)]
struct FailureStreak(u32);

impl FailureStreak {
    fn record(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Publish `Unavailable` unless the loop was already cancelled.
///
/// The cancel flag is checked under the snapshot lock, so nothing lands after
/// `stop()` has marked the monitor idle.
fn publish_unavailable(published: &watch::Sender<MonitorSnapshot>, cancel: &AtomicBool) {
    published.send_if_modified(|s| {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        s.health = MonitorHealth::Unavailable;
        s.device_index = None;
        true
    });
}

/// Marks the monitor unavailable if the loop unwinds
struct PanicGuard {
    cancel: Arc<AtomicBool>,
    published: Arc<watch::Sender<MonitorSnapshot>>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Sampling loop panicked, monitor unavailable");
            publish_unavailable(&self.published, &self.cancel);
        }
    }
}

/// Everything the loop owns while it runs
pub(crate) struct SamplingLoop<R: FrameReader, D: FaceDetector> {
    pub session: CaptureSession<R>,
    pub detector: D,
    pub tracker: AttentionTracker,
    pub config: MonitorConfig,
    pub cancel: Arc<AtomicBool>,
    pub published: Arc<watch::Sender<MonitorSnapshot>>,
}

impl<R: FrameReader, D: FaceDetector> SamplingLoop<R, D> {
    /// Sample until cancelled, a fatal failure, or the failure bound, then
    /// release the camera and hand the detector back
    pub fn run(mut self) -> D {
        let _guard = PanicGuard {
            cancel: Arc::clone(&self.cancel),
            published: Arc::clone(&self.published),
        };

        info!(
            "Sampling loop started on camera {} (threshold {:?}, interval {:?})",
            self.session.device_index(),
            self.tracker.threshold(),
            self.config.sample_interval()
        );

        let mut streak = FailureStreak::default();

        while !self.cancel.load(Ordering::Acquire) {
            match self.sample() {
                Ok(()) => {
                    streak.reset();
                    thread::sleep(self.config.sample_interval());
                }
                Err(failure) => {
                    let consecutive_failures = streak.record();
                    match &failure {
                        SampleFailure::Read(_) => {
                            metrics::counter!("attention_read_failures_total").increment(1)
                        }
                        SampleFailure::Detect(_) => {
                            metrics::counter!("attention_detect_failures_total").increment(1)
                        }
                    }

                    if failure.is_fatal() {
                        warn!("Unrecoverable sampling failure, monitor unavailable: {}", failure);
                        publish_unavailable(&self.published, &self.cancel);
                        break;
                    }
                    debug!("Sample failed ({} in a row): {}", consecutive_failures, failure);

                    if let Some(max) = self.config.max_consecutive_failures {
                        if consecutive_failures >= max {
                            warn!(
                                "Giving up after {} consecutive failed samples, monitor unavailable",
                                consecutive_failures
                            );
                            publish_unavailable(&self.published, &self.cancel);
                            break;
                        }
                    }

                    thread::sleep(self.config.read_backoff());
                }
            }
        }

        self.session.close();
        info!("Sampling loop exited");
        self.detector
    }

    fn sample(&mut self) -> Result<(), SampleFailure> {
        let frame = self.session.read_frame().map_err(SampleFailure::Read)?;
        let detection = self.detector.detect(&frame).map_err(SampleFailure::Detect)?;
        metrics::counter!("attention_frames_total").increment(1);

        let has_face = detection.has_face();
        let previous = self.tracker.status();
        let status = self.tracker.observe(has_face, Instant::now());

        // A loop abandoned by a timed-out stop must not publish over `Idle`
        let cancel = &self.cancel;
        let published = self.published.send_if_modified(|snapshot| {
            if cancel.load(Ordering::Acquire) {
                return false;
            }
            snapshot.status = status;
            snapshot.samples += 1;
            if has_face {
                snapshot.last_presence_at = Some(Utc::now());
            }
            true
        });
        if !published {
            debug!("Sample after cancel discarded");
            return Ok(());
        }

        if status != previous {
            metrics::gauge!("attention_distracted").set(if status.is_distracted() { 1.0 } else { 0.0 });
            match status {
                AttentionStatus::Distracted => info!(
                    "Status -> distracted (no face for {:?})",
                    self.tracker.absence(Instant::now())
                ),
                AttentionStatus::Focused => info!("Status -> focused"),
            }
        }
        Ok(())
    }
}
