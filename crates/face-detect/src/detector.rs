//! ONNX Runtime face detector

use camera_capture::VideoFrame;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{DetectorConfig, DetectorError, Detection, FaceDetector};

/// Values per model output row: cx, cy, w, h, score
const ROW_STRIDE: usize = 5;

/// Face bounding box in frame pixels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBbox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &FaceBbox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let inter = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Greedy NMS: highest score first, drop anything overlapping a kept box
pub fn non_max_suppression(mut boxes: Vec<FaceBbox>, iou_threshold: f32) -> Vec<FaceBbox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceBbox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Turn raw `(cx, cy, w, h, score)` rows (normalized coordinates) into boxes
/// scaled to the frame, keeping rows at or above `confidence` whose sides are
/// both at least `min_face_px`
pub fn decode_rows(
    raw: &[f32],
    confidence: f32,
    min_face_px: f32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<FaceBbox> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    raw.chunks_exact(ROW_STRIDE)
        .filter(|row| row[4] >= confidence)
        .map(|row| {
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            FaceBbox {
                x: (cx - w / 2.0) * fw,
                y: (cy - h / 2.0) * fh,
                width: w * fw,
                height: h * fh,
                confidence: row[4],
            }
        })
        .filter(|b| b.width >= min_face_px && b.height >= min_face_px)
        .collect()
}

/// Face detector running a single-output ONNX model.
///
/// The model takes a `1x3xSxS` tensor normalized to -1..1 and returns
/// `[1, N, 5]` candidate rows. The session is loaded lazily by
/// `ensure_ready`, so construction never touches the filesystem.
pub struct OnnxFaceDetector {
    config: DetectorConfig,
    session: Option<Session>,
}

impl OnnxFaceDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    fn load_session(&self) -> Result<Session, DetectorError> {
        let path = self
            .config
            .model_path
            .as_ref()
            .ok_or_else(|| DetectorError::Unavailable("no face model path configured".into()))?;

        if !path.exists() {
            error!("Face model not found at {}", path.display());
            return Err(DetectorError::Unavailable(format!(
                "face model not found at {}",
                path.display()
            )));
        }

        info!("Loading face detection model from {}", path.display());
        Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load face model: {}", e);
                DetectorError::ModelLoad(e.to_string())
            })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, DetectorError> {
        let img = frame
            .as_image()
            .ok_or_else(|| DetectorError::ImageProcessing("Failed to create image buffer".into()))?;

        let size = self.config.input_size;
        let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        let side = size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 127.5) - 1.0;
            }
        }
        Ok(input)
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn ensure_ready(&mut self) -> Result<(), DetectorError> {
        self.config.validate()?;
        if self.session.is_none() {
            self.session = Some(self.load_session()?);
        }
        Ok(())
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection, DetectorError> {
        let input = self.preprocess(frame)?;
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| DetectorError::Unavailable("face model not loaded".into()))?;

        let outputs = session
            .run(ort::inputs![input].map_err(|e| DetectorError::Inference(e.to_string()))?)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let raw: Vec<f32> = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        if raw.len() % ROW_STRIDE != 0 {
            return Err(DetectorError::Inference(format!(
                "unexpected output length {} (not a multiple of {})",
                raw.len(),
                ROW_STRIDE
            )));
        }

        let candidates = decode_rows(
            &raw,
            self.config.confidence,
            self.config.min_face_px,
            frame.width,
            frame.height,
        );
        let faces = non_max_suppression(candidates, self.config.iou_threshold);
        debug!("Frame {}: {} face(s)", frame.sequence, faces.len());

        Ok(Detection { faces })
    }
}
