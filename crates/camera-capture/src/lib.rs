//! Camera Capture Library for Attention Monitoring
//!
//! Owns the video input side of the monitor:
//! - Probing an ordered list of candidate device indices
//! - Blocking frame reads through a `CaptureSession`
//! - Guaranteed, exactly-once release of the device handle
//! - A replay source that serves recorded frames as a device

pub mod frame;
pub mod replay;
pub mod session;

pub use frame::VideoFrame;
pub use replay::{ReplayReader, ReplaySource};
pub use session::{CaptureSession, FrameReader, VideoSource};

use thiserror::Error;

/// Device indices probed when no explicit list is configured
pub const DEFAULT_CANDIDATE_DEVICES: [u32; 3] = [0, 1, 2];

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("No camera could be opened (tried indices {tried:?})")]
    NoDeviceAvailable { tried: Vec<u32> },

    #[error("Failed to open camera {index}: {reason}")]
    Open { index: u32, reason: String },

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Camera disconnected: {0}")]
    Disconnected(String),
}

impl CameraError {
    /// Whether the caller should back off and retry the read
    pub fn is_transient(&self) -> bool {
        matches!(self, CameraError::Read(_) | CameraError::Decode(_))
    }
}
