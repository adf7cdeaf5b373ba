//! Fake camera and detector shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use attention::MonitorConfig;
use camera_capture::{CameraError, FrameReader, VideoFrame, VideoSource};
use face_detect::{Detection, DetectorError, FaceDetector};

/// Counters and knobs behind a `FakeCamera`
#[derive(Default)]
pub struct CameraState {
    pub working: Mutex<Vec<u32>>,
    /// Devices currently held; a held device refuses a second open
    pub held: Mutex<HashSet<u32>>,
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub reads: AtomicUsize,
    /// Reads that fail before reads start succeeding
    pub fail_next: AtomicU32,
    /// Every read fails
    pub always_fail: AtomicBool,
    /// Reads block for this long (milliseconds)
    pub stall_ms: AtomicU32,
    /// Reads report the device as unplugged
    pub disconnected: AtomicBool,
}

#[derive(Clone)]
pub struct FakeCamera {
    pub state: Arc<CameraState>,
}

impl FakeCamera {
    pub fn with_devices(working: &[u32]) -> Self {
        let state = CameraState::default();
        *state.working.lock().unwrap() = working.to_vec();
        Self {
            state: Arc::new(state),
        }
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }
}

pub struct FakeReader {
    index: u32,
    state: Arc<CameraState>,
}

impl FrameReader for FakeReader {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let stall = self.state.stall_ms.load(Ordering::SeqCst);
        if stall > 0 {
            thread::sleep(Duration::from_millis(stall as u64));
        }

        let n = self.state.reads.fetch_add(1, Ordering::SeqCst);
        if self.state.disconnected.load(Ordering::SeqCst) {
            return Err(CameraError::Disconnected("device unplugged".into()));
        }
        if self.state.always_fail.load(Ordering::SeqCst) {
            return Err(CameraError::Read("device not responding".into()));
        }
        let pending = self.state.fail_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.state.fail_next.store(pending - 1, Ordering::SeqCst);
            return Err(CameraError::Read("dropped frame".into()));
        }

        Ok(VideoFrame::new(vec![0; 4 * 4 * 3], 4, 4, 0, n as u32))
    }

    fn release(&mut self) {
        self.state.held.lock().unwrap().remove(&self.index);
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl VideoSource for FakeCamera {
    type Reader = FakeReader;

    fn open(&self, index: u32) -> Result<FakeReader, CameraError> {
        if !self.state.working.lock().unwrap().contains(&index) {
            return Err(CameraError::Open {
                index,
                reason: "no such device".into(),
            });
        }
        if !self.state.held.lock().unwrap().insert(index) {
            return Err(CameraError::Open {
                index,
                reason: "device busy".into(),
            });
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeReader {
            index,
            state: Arc::clone(&self.state),
        })
    }
}

/// Detector whose answer is flipped from the test
#[derive(Clone)]
pub struct FakeDetector {
    pub ready: bool,
    pub face: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
    /// Detection reports the model as gone
    pub lost_model: Arc<AtomicBool>,
}

impl FakeDetector {
    pub fn seeing_face(face: bool) -> Self {
        Self {
            ready: true,
            face: Arc::new(AtomicBool::new(face)),
            calls: Arc::new(AtomicUsize::new(0)),
            lost_model: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn missing_model() -> Self {
        Self {
            ready: false,
            ..Self::seeing_face(true)
        }
    }
}

impl FaceDetector for FakeDetector {
    fn ensure_ready(&mut self) -> Result<(), DetectorError> {
        if self.ready {
            Ok(())
        } else {
            Err(DetectorError::Unavailable("cascade file missing".into()))
        }
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Result<Detection, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.lost_model.load(Ordering::SeqCst) {
            return Err(DetectorError::Unavailable("face model not loaded".into()));
        }
        let count = usize::from(self.face.load(Ordering::SeqCst));
        Ok(Detection::with_count(count))
    }
}

/// Detector that panics on its first frame
pub struct PanickingDetector;

impl FaceDetector for PanickingDetector {
    fn ensure_ready(&mut self) -> Result<(), DetectorError> {
        Ok(())
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Result<Detection, DetectorError> {
        panic!("detector crashed");
    }
}

pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        sample_interval_ms: 5,
        read_backoff_ms: 5,
        ..Default::default()
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
