//! YOLOv8 person detector via ONNX Runtime.
//!
//! Decodes the anchor-free YOLOv8 output head ([1, 4 + classes, anchors]),
//! keeping only the person class, with IoU NMS post-processing.

use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;
use vigil_core::{Frame, PersonDetection, Region};

// --- Named constants (no magic numbers) ---
const YOLO_INPUT_SIZE: usize = 640;
/// Ultralytics letterbox pad value (gray 114, normalizes to 114/255).
const YOLO_PAD_VALUE: u8 = 114;
const YOLO_SCORE_THRESHOLD: f32 = 0.25;
const YOLO_NMS_THRESHOLD: f32 = 0.45;
/// COCO class index for "person".
const PERSON_CLASS: usize = 0;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — export yolov8n to ONNX and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// YOLOv8-based person detector.
pub struct YoloPersonDetector {
    session: Session,
    input_size: usize,
}

impl YoloPersonDetector {
    /// Load the YOLOv8 ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            "loaded YOLOv8 model"
        );

        Ok(Self { session, input_size: YOLO_INPUT_SIZE })
    }

    /// Detect persons in a grayscale frame, sorted by confidence.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<PersonDetection>, DetectorError> {
        let (input, letterbox) = self.preprocess(frame, width, height)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("predictions: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 || dims[1] < 5 {
            return Err(DetectorError::InferenceFailed(format!(
                "unexpected output shape {dims:?} (need [1, 4 + classes, anchors])"
            )));
        }
        let attrs = dims[1];
        let anchors = dims[2];

        let detections =
            decode_predictions(data, attrs, anchors, &letterbox, YOLO_SCORE_THRESHOLD);

        let mut result = nms(detections, YOLO_NMS_THRESHOLD);
        result.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(result)
    }

    /// Preprocess a grayscale frame into a NCHW float tensor with letterbox
    /// padding, values scaled to [0, 1].
    fn preprocess(
        &self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(Array4<f32>, LetterboxInfo), DetectorError> {
        let size = self.input_size;
        let scale_w = size as f32 / width as f32;
        let scale_h = size as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = ((width as f32 * scale).round() as u32).max(1);
        let new_h = ((height as f32 * scale).round() as u32).max(1);
        let pad_x = (size as f32 - new_w as f32) / 2.0;
        let pad_y = (size as f32 - new_h as f32) / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let gray = GrayImage::from_raw(width, height, frame.to_vec()).ok_or_else(|| {
            DetectorError::InferenceFailed(format!(
                "frame buffer does not match {width}x{height}"
            ))
        })?;
        let resized = image::imageops::resize(&gray, new_w, new_h, FilterType::Triangle);

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let inside_y = y >= pad_y_start && y < pad_y_start + new_h as usize;
                let inside_x = x >= pad_x_start && x < pad_x_start + new_w as usize;
                let pixel = if inside_y && inside_x {
                    resized.get_pixel((x - pad_x_start) as u32, (y - pad_y_start) as u32)[0]
                } else {
                    YOLO_PAD_VALUE
                };

                let normalized = pixel as f32 / 255.0;
                // Grayscale → 3-channel: replicate Y → [R=Y, G=Y, B=Y]
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        Ok((tensor, letterbox))
    }
}

impl vigil_core::PersonDetector for YoloPersonDetector {
    fn locate_persons(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PersonDetection>, vigil_core::error::DetectorError> {
        self.detect(&frame.data, frame.width, frame.height)
            .map_err(|e| vigil_core::error::DetectorError(e.to_string()))
    }
}

/// Decode the YOLOv8 prediction tensor for the person class only.
///
/// Layout is attribute-major: rows 0..4 are cx/cy/w/h, rows 4.. are
/// per-class scores, each row `anchors` long.
fn decode_predictions(
    data: &[f32],
    attrs: usize,
    anchors: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<PersonDetection> {
    let mut detections = Vec::new();
    if data.len() < attrs * anchors {
        return detections;
    }

    let at = |attr: usize, anchor: usize| data[attr * anchors + anchor];

    for a in 0..anchors {
        let score = at(4 + PERSON_CLASS, a);
        if score < threshold {
            continue;
        }

        let cx = at(0, a);
        let cy = at(1, a);
        let w = at(2, a);
        let h = at(3, a);

        // Map from letterboxed space to original frame space.
        let x1 = (cx - w / 2.0 - letterbox.pad_x) / letterbox.scale;
        let y1 = (cy - h / 2.0 - letterbox.pad_y) / letterbox.scale;

        detections.push(PersonDetection {
            confidence: score,
            region: Region {
                x: x1,
                y: y1,
                width: w / letterbox.scale,
                height: h / letterbox.scale,
            },
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<PersonDetection>, iou_threshold: f32) -> Vec<PersonDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i].region, &detections[j].region) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two regions.
fn iou(a: &Region, b: &Region) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = a.width * a.height;
    let area_b = b.width * b.height;
    let union_area = area_a + area_b - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, w: f32, h: f32) -> Region {
        Region { x, y, width: w, height: h }
    }

    fn det(x: f32, y: f32, w: f32, h: f32, conf: f32) -> PersonDetection {
        PersonDetection { confidence: conf, region: region(x, y, w, h) }
    }

    #[test]
    fn test_iou_identical() {
        let a = region(0.0, 0.0, 100.0, 100.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = region(0.0, 0.0, 10.0, 10.0);
        let b = region(20.0, 20.0, 10.0, 10.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = region(0.0, 0.0, 10.0, 10.0);
        let b = region(5.0, 0.0, 10.0, 10.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        let expected = 50.0 / 150.0;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.9),
            det(5.0, 5.0, 100.0, 100.0, 0.8),
            det(200.0, 200.0, 50.0, 50.0, 0.7),
        ];
        let result = nms(detections, 0.45);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.45).is_empty());
    }

    #[test]
    fn test_decode_picks_person_class_only() {
        // 2 anchors, attrs = 4 bbox + 2 classes. Anchor 0 is a confident
        // person; anchor 1 scores high only on the second class.
        let attrs = 6;
        let anchors = 2;
        let mut data = vec![0.0f32; attrs * anchors];
        let mut set = |attr: usize, anchor: usize, v: f32| data[attr * anchors + anchor] = v;

        set(0, 0, 320.0); // cx
        set(1, 0, 320.0); // cy
        set(2, 0, 100.0); // w
        set(3, 0, 200.0); // h
        set(4, 0, 0.9); // person score
        set(5, 0, 0.1);

        set(0, 1, 100.0);
        set(1, 1, 100.0);
        set(2, 1, 50.0);
        set(3, 1, 50.0);
        set(4, 1, 0.05); // below threshold
        set(5, 1, 0.95); // not the person class

        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let dets = decode_predictions(&data, attrs, anchors, &letterbox, 0.25);

        assert_eq!(dets.len(), 1);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert!((dets[0].region.x - 270.0).abs() < 1e-3);
        assert!((dets[0].region.y - 220.0).abs() < 1e-3);
        assert!((dets[0].region.width - 100.0).abs() < 1e-3);
        assert!((dets[0].region.height - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_demaps_letterbox() {
        let attrs = 5;
        let anchors = 1;
        // Person centered at (420, 320) in a 640 letterbox of a 1280x960
        // frame: scale 0.5, pad_x 0, pad_y 80.
        let data = vec![420.0, 320.0, 100.0, 100.0, 0.8];
        let letterbox = LetterboxInfo { scale: 0.5, pad_x: 0.0, pad_y: 80.0 };
        let dets = decode_predictions(&data, attrs, anchors, &letterbox, 0.25);

        assert_eq!(dets.len(), 1);
        let r = &dets[0].region;
        assert!((r.x - 740.0).abs() < 1e-3);
        assert!((r.y - 380.0).abs() < 1e-3);
        assert!((r.width - 200.0).abs() < 1e-3);
        assert!((r.height - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_truncated_tensor_is_empty() {
        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        assert!(decode_predictions(&[0.0; 3], 6, 2, &letterbox, 0.25).is_empty());
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let width = 320.0f32;
        let height = 240.0f32;
        let scale = (640.0 / width).min(640.0 / height);
        let new_w = (width * scale).round();
        let new_h = (height * scale).round();
        let letterbox = LetterboxInfo {
            scale,
            pad_x: (640.0 - new_w) / 2.0,
            pad_y: (640.0 - new_h) / 2.0,
        };

        let orig_x = 100.0f32;
        let orig_y = 50.0f32;
        let boxed_x = orig_x * scale + letterbox.pad_x;
        let boxed_y = orig_y * scale + letterbox.pad_y;

        let recovered_x = (boxed_x - letterbox.pad_x) / letterbox.scale;
        let recovered_y = (boxed_y - letterbox.pad_y) / letterbox.scale;

        assert!((recovered_x - orig_x).abs() < 0.1, "x: {recovered_x} vs {orig_x}");
        assert!((recovered_y - orig_y).abs() < 0.1, "y: {recovered_y} vs {orig_y}");
    }
}
