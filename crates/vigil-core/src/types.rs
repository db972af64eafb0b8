use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// A captured grayscale camera frame.
///
/// Owned by the pipeline iteration that admitted it and dropped at the end
/// of that iteration; nothing retains frames across iterations.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Wall-clock capture time, used for log rows and snapshot paths.
    pub captured_at: DateTime<Utc>,
    /// Monotonic capture instant, used for cooldown arithmetic.
    pub instant: Instant,
    /// Driver sequence number of the raw capture.
    pub sequence: u64,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Average pixel brightness (0.0–255.0).
    pub fn mean_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }

    /// Crop the frame to `region`, clamped to the frame bounds.
    ///
    /// A region lying entirely outside the frame yields an empty patch.
    pub fn crop(&self, region: &Region) -> FacePatch {
        let x0 = (region.x.max(0.0) as u32).min(self.width);
        let y0 = (region.y.max(0.0) as u32).min(self.height);
        let x1 = ((region.x + region.width).max(0.0) as u32).min(self.width);
        let y1 = ((region.y + region.height).max(0.0) as u32).min(self.height);

        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);

        let mut data = Vec::with_capacity((w * h) as usize);
        for y in y0..y1 {
            let row = (y * self.width + x0) as usize;
            data.extend_from_slice(&self.data[row..row + w as usize]);
        }

        FacePatch { data, width: w, height: h }
    }
}

/// A grayscale crop handed to the face embedder.
#[derive(Debug, Clone)]
pub struct FacePatch {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Axis-aligned bounding region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One person candidate from the detector collaborator.
#[derive(Debug, Clone)]
pub struct PersonDetection {
    pub confidence: f32,
    pub region: Region,
}

/// Outcome of the presence gate for one admitted frame.
///
/// Invariant: `person_present` is true exactly when `confidence` reached
/// the gate's presence threshold.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub person_present: bool,
    /// Confidence of the best detection, 0.0 when nothing was detected.
    pub confidence: f32,
    pub region: Option<Region>,
}

/// Face embedding vector (512-dimensional for ArcFace-family models).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A resolved identity: an enrolled label, or the `Unknown` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Identity::Unknown)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Known(label) => f.write_str(label),
            Identity::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Result of matching a probe embedding against the gallery.
///
/// `identity` is `Unknown` exactly when the minimum gallery distance
/// exceeded the tolerance, the gallery was empty, or no face was locatable
/// in the detected region (`distance` is then infinite).
#[derive(Debug, Clone)]
pub struct IdentityMatch {
    pub identity: Identity,
    pub distance: f32,
}

/// An enrolled face model with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub label: String,
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
}

/// The unit handed to the dispatcher: one admitted, non-suppressed
/// classification. Immutable; consumed by a single dispatch.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub timestamp: DateTime<Utc>,
    pub identity: Identity,
    pub matched: bool,
    pub distance: f32,
}

/// One append-only activity log row.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    /// Empty column when no snapshot was persisted for this event.
    pub snapshot_path: Option<PathBuf>,
}

/// Payload for the optional alert channel.
#[derive(Debug, Clone)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub snapshot_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
            captured_at: Utc::now(),
            instant: Instant::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_mean_brightness() {
        let f = frame(vec![10, 20, 30, 40], 2, 2);
        assert!((f.mean_brightness() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_brightness_empty() {
        let f = frame(vec![], 0, 0);
        assert_eq!(f.mean_brightness(), 0.0);
    }

    #[test]
    fn test_crop_interior() {
        // 4x4 frame with row-major values 0..16
        let f = frame((0..16).collect(), 4, 4);
        let patch = f.crop(&Region { x: 1.0, y: 1.0, width: 2.0, height: 2.0 });
        assert_eq!(patch.width, 2);
        assert_eq!(patch.height, 2);
        assert_eq!(patch.data, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let f = frame((0..16).collect(), 4, 4);
        let patch = f.crop(&Region { x: 2.0, y: 2.0, width: 10.0, height: 10.0 });
        assert_eq!(patch.width, 2);
        assert_eq!(patch.height, 2);
        assert_eq!(patch.data, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_crop_outside_is_empty() {
        let f = frame((0..16).collect(), 4, 4);
        let patch = f.crop(&Region { x: 100.0, y: 100.0, width: 5.0, height: 5.0 });
        assert_eq!(patch.width, 0);
        assert_eq!(patch.height, 0);
        assert!(patch.data.is_empty());
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding { values: vec![0.0, 0.0], model_version: None };
        let b = Embedding { values: vec![3.0, 4.0], model_version: None };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding { values: vec![1.0, 2.0, 3.0], model_version: None };
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::Known("deepak".into()).to_string(), "deepak");
        assert_eq!(Identity::Unknown.to_string(), "Unknown");
    }
}
