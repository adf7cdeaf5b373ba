//! Capture sessions over pluggable video sources

use tracing::{debug, error, info, warn};

use crate::{CameraError, VideoFrame};

/// An opened video device
pub trait FrameReader: Send {
    /// Read the next frame, blocking on device I/O
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device
    fn release(&mut self);
}

/// Something that can open video devices by index
pub trait VideoSource: Send + Sync {
    type Reader: FrameReader + 'static;

    /// Open the device at `index`
    fn open(&self, index: u32) -> Result<Self::Reader, CameraError>;
}

/// Exclusive handle to the first working device of a candidate list.
///
/// The device is released exactly once: by `close()` or, failing that, on drop.
pub struct CaptureSession<R: FrameReader> {
    device_index: u32,
    reader: Option<R>,
}

impl<R: FrameReader> CaptureSession<R> {
    /// Probe `candidates` in order and keep the first device that opens
    pub fn open<S>(source: &S, candidates: &[u32]) -> Result<Self, CameraError>
    where
        S: VideoSource<Reader = R>,
    {
        for &index in candidates {
            debug!("Attempting to open camera index {}", index);
            match source.open(index) {
                Ok(reader) => {
                    info!("Opened camera index {}", index);
                    return Ok(Self {
                        device_index: index,
                        reader: Some(reader),
                    });
                }
                Err(e) => warn!("Camera index {} unavailable: {}", index, e),
            }
        }

        error!("Could not open any camera (tried {:?})", candidates);
        Err(CameraError::NoDeviceAvailable {
            tried: candidates.to_vec(),
        })
    }

    /// Index of the device this session holds
    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    /// Read the next frame (blocking)
    pub fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        match self.reader.as_mut() {
            Some(reader) => reader.read_frame(),
            None => Err(CameraError::Disconnected("capture session is closed".into())),
        }
    }

    /// Release the device. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.release();
            info!("Released camera index {}", self.device_index);
        }
    }
}

impl<R: FrameReader> Drop for CaptureSession<R> {
    fn drop(&mut self) {
        self.close();
    }
}
