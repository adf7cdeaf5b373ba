//! Detector configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DetectorError;

/// Face detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ONNX face model; detection is unavailable without one
    pub model_path: Option<PathBuf>,

    /// Minimum score for a candidate box
    pub confidence: f32,

    /// Overlap above which the weaker of two boxes is suppressed
    pub iou_threshold: f32,

    /// Square model input side in pixels
    pub input_size: u32,

    /// Boxes narrower or shorter than this (frame pixels) are ignored
    pub min_face_px: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            confidence: 0.75,
            iou_threshold: 0.3,
            input_size: 128,
            min_face_px: 30.0,
        }
    }
}

impl DetectorConfig {
    pub fn with_model(path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Reject settings the detector cannot run with
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.input_size == 0 {
            return Err(DetectorError::Config("input_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectorError::Config(format!(
                "confidence must be within 0..=1, got {}",
                self.confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectorError::Config(format!(
                "iou_threshold must be within 0..=1, got {}",
                self.iou_threshold
            )));
        }
        if !(self.min_face_px >= 0.0) {
            return Err(DetectorError::Config("min_face_px must be >= 0".into()));
        }
        Ok(())
    }
}
