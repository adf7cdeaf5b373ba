//! Face Detection Adapter
//!
//! The monitor only needs one answer per frame: how many faces are visible.
//! `FaceDetector` is that capability; `OnnxFaceDetector` is the bundled
//! implementation backed by ONNX Runtime.

pub mod config;
pub mod detector;

pub use config::DetectorConfig;
pub use detector::{non_max_suppression, FaceBbox, OnnxFaceDetector};

use camera_capture::VideoFrame;
use thiserror::Error;

/// Detector error types
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Detector unavailable: {0}")]
    Unavailable(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Invalid detector configuration: {0}")]
    Config(String),
}

impl DetectorError {
    /// Errors that mean the detector can never produce results
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DetectorError::Unavailable(_) | DetectorError::ModelLoad(_) | DetectorError::Config(_)
        )
    }
}

/// Result of running detection on one frame
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub faces: Vec<FaceBbox>,
}

impl Detection {
    /// Detection carrying `count` placeholder boxes
    pub fn with_count(count: usize) -> Self {
        Self {
            faces: vec![FaceBbox::default(); count],
        }
    }

    /// At least one face in frame
    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }
}

/// Face detection capability
pub trait FaceDetector: Send {
    /// Make sure the detector can run, loading any model it needs
    fn ensure_ready(&mut self) -> Result<(), DetectorError>;

    /// Detect faces in `frame`
    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection, DetectorError>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn ensure_ready(&mut self) -> Result<(), DetectorError> {
        (**self).ensure_ready()
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection, DetectorError> {
        (**self).detect(frame)
    }
}
