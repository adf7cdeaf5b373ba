//! Monitor controller: lifecycle of the sampling loop and status publication

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use camera_capture::{CaptureSession, VideoSource};
use chrono::{DateTime, Utc};
use face_detect::{DetectorError, FaceDetector};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::worker::SamplingLoop;
use crate::{AttentionStatus, AttentionTracker, MonitorConfig, MonitorError};

/// Lifecycle state of the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorHealth {
    /// Never started, or stopped
    #[default]
    Idle,
    Running,
    /// Loop ended on its own: an unrecoverable failure, the failure bound,
    /// or a panic
    Unavailable,
}

/// Everything readers can observe, published as one value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub status: AttentionStatus,
    pub health: MonitorHealth,
    /// Wall-clock time of the last frame with a face
    pub last_presence_at: Option<DateTime<Utc>>,
    /// Samples fed to the state machine since the last start
    pub samples: u64,
    /// Camera held by the running loop
    pub device_index: Option<u32>,
}

struct Worker<D> {
    cancel: Arc<AtomicBool>,
    /// Disconnects when the loop thread ends
    exited: mpsc::Receiver<()>,
    handle: JoinHandle<D>,
}

impl<D> Worker<D> {
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn join(self) -> Option<D> {
        match self.handle.join() {
            Ok(detector) => Some(detector),
            Err(_) => {
                warn!("Sampling loop panicked, face detector lost");
                None
            }
        }
    }
}

struct Lifecycle<D> {
    /// Present while no loop owns it
    detector: Option<D>,
    worker: Option<Worker<D>>,
}

/// Attention monitor.
///
/// `start`, `stop` and the status readers all take `&self`, so one monitor can
/// be shared across request handlers behind an `Arc`. Readers only touch the
/// published snapshot and never wait on the lifecycle lock.
pub struct Monitor<S: VideoSource, D: FaceDetector + 'static> {
    config: MonitorConfig,
    source: S,
    lifecycle: Mutex<Lifecycle<D>>,
    published: Arc<watch::Sender<MonitorSnapshot>>,
}

impl<S: VideoSource, D: FaceDetector + 'static> Monitor<S, D> {
    pub fn new(config: MonitorConfig, source: S, detector: D) -> Result<Self, MonitorError> {
        config.validate()?;
        let (published, _) = watch::channel(MonitorSnapshot::default());

        Ok(Self {
            config,
            source,
            lifecycle: Mutex::new(Lifecycle {
                detector: Some(detector),
                worker: None,
            }),
            published: Arc::new(published),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle<D>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the sampling loop. Does nothing if it is already running.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut lifecycle = self.lock();

        if let Some(worker) = lifecycle.worker.take() {
            // Finished covers a loop that panicked; Unavailable one that gave up
            let exiting = worker.is_finished() || self.health() == MonitorHealth::Unavailable;
            if !exiting {
                let cancelled = worker.is_cancelled();
                lifecycle.worker = Some(worker);
                if cancelled {
                    // Abandoned by a timed-out stop and still stuck
                    return Err(MonitorError::Busy);
                }
                debug!("Monitor already running");
                return Ok(());
            }
            lifecycle.detector = worker.join();
        }

        let detector = lifecycle.detector.as_mut().ok_or_else(|| {
            MonitorError::DetectorUnavailable(DetectorError::Unavailable(
                "face detector was lost by a previous sampling loop".into(),
            ))
        })?;
        detector.ensure_ready().map_err(|e| {
            warn!("Cannot start monitor: {}", e);
            MonitorError::DetectorUnavailable(e)
        })?;

        let session = CaptureSession::open(&self.source, &self.config.candidate_devices)
            .map_err(MonitorError::NoDeviceAvailable)?;
        let device_index = session.device_index();

        let Some(detector) = lifecycle.detector.take() else {
            return Err(MonitorError::Busy);
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let (exited_tx, exited) = mpsc::channel::<()>();

        self.published.send_replace(MonitorSnapshot {
            health: MonitorHealth::Running,
            device_index: Some(device_index),
            ..Default::default()
        });

        let sampling = SamplingLoop {
            session,
            detector,
            tracker: AttentionTracker::new(self.config.distraction_threshold(), Instant::now()),
            config: self.config.clone(),
            cancel: Arc::clone(&cancel),
            published: Arc::clone(&self.published),
        };

        let handle = thread::Builder::new()
            .name("attention-sampler".into())
            .spawn(move || {
                let _exited = exited_tx;
                sampling.run()
            })
            .map_err(|e| {
                self.published.send_modify(|s| {
                    s.health = MonitorHealth::Idle;
                    s.device_index = None;
                });
                MonitorError::Spawn(e.to_string())
            })?;

        lifecycle.worker = Some(Worker {
            cancel,
            exited,
            handle,
        });
        info!("Attention monitor started on camera {}", device_index);
        Ok(())
    }

    /// Stop the sampling loop and wait for it to release the camera.
    /// Does nothing if it is not running.
    pub fn stop(&self) -> Result<(), MonitorError> {
        let mut lifecycle = self.lock();
        let Some(worker) = lifecycle.worker.take() else {
            return Ok(());
        };

        worker.cancel.store(true, Ordering::Release);

        if let Some(timeout) = self.config.stop_timeout() {
            if let Err(RecvTimeoutError::Timeout) = worker.exited.recv_timeout(timeout) {
                warn!("Sampling loop still busy after {:?}, abandoning it", timeout);
                lifecycle.worker = Some(worker);
                self.mark_stopped();
                return Err(MonitorError::StopTimedOut(timeout));
            }
        }

        lifecycle.detector = worker.join();
        self.mark_stopped();
        info!("Attention monitor stopped");
        Ok(())
    }

    fn mark_stopped(&self) {
        self.published.send_modify(|s| {
            s.health = MonitorHealth::Idle;
            s.device_index = None;
        });
    }

    /// Current status; the initial status before any sample is `Focused`
    pub fn status(&self) -> AttentionStatus {
        self.published.borrow().status
    }

    pub fn health(&self) -> MonitorHealth {
        self.published.borrow().health
    }

    pub fn is_running(&self) -> bool {
        self.health() == MonitorHealth::Running
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.published.borrow().clone()
    }

    /// Receiver that is notified on every published sample
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.published.subscribe()
    }
}

impl<S: VideoSource, D: FaceDetector + 'static> Drop for Monitor<S, D> {
    fn drop(&mut self) {
        // Signal only; the loop releases the camera on its way out
        let lifecycle = self.lock();
        if let Some(worker) = &lifecycle.worker {
            worker.cancel.store(true, Ordering::Release);
            debug!("Monitor dropped, sampling loop cancelled");
        }
    }
}
