//! Replay source: recorded stills served as a video device
//!
//! Device `N` is the directory `<root>/video<N>/`. Its image files are read in
//! file-name order and the sequence loops forever.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::debug;

use crate::session::{FrameReader, VideoSource};
use crate::{CameraError, VideoFrame};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Directory-backed video source
#[derive(Debug, Clone)]
pub struct ReplaySource {
    root: PathBuf,
}

impl ReplaySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the frames of device `index`
    pub fn device_dir(&self, index: u32) -> PathBuf {
        self.root.join(format!("video{index}"))
    }
}

impl VideoSource for ReplaySource {
    type Reader = ReplayReader;

    fn open(&self, index: u32) -> Result<ReplayReader, CameraError> {
        let dir = self.device_dir(index);
        let frames = list_frames(&dir).map_err(|reason| CameraError::Open { index, reason })?;
        if frames.is_empty() {
            return Err(CameraError::Open {
                index,
                reason: format!("no frames in {}", dir.display()),
            });
        }

        debug!("Replay device {} has {} frames", index, frames.len());
        Ok(ReplayReader {
            frames,
            cursor: 0,
            sequence: 0,
            opened_at: Instant::now(),
            released: false,
        })
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = fs::read_dir(dir).map_err(|e| format!("{}: {e}", dir.display()))?;

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// Open replay device
pub struct ReplayReader {
    frames: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
    opened_at: Instant,
    released: bool,
}

impl FrameReader for ReplayReader {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::Disconnected("replay device released".into()));
        }

        let path = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();

        let bytes = fs::read(path).map_err(|e| CameraError::Read(format!("{}: {e}", path.display())))?;
        let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
        let frame = VideoFrame::decode(&bytes, timestamp_ns, self.sequence)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
