//! Collaborator capability contracts consumed by the pipeline.
//!
//! Any implementation satisfying these contracts is substitutable; the
//! pipeline's invariants do not depend on the concrete camera, model, or
//! storage behind them.

use crate::error::{AlertError, AppendError, CaptureError, DetectorError, EmbedderError, SnapshotError};
use crate::types::{Alert, Embedding, FacePatch, Frame, LogRecord, PersonDetection};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Produces captured frames.
///
/// `Ok(None)` means the timeout elapsed with no frame available; the
/// controller treats that as a transient skip, not an error.
pub trait FrameSource: Send {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError>;
}

/// Locates person candidates in a frame.
///
/// Implementations may be stateful (model sessions), hence `&mut self`.
pub trait PersonDetector: Send {
    fn locate_persons(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, DetectorError>;
}

/// Embeds the face found in a pre-cropped patch.
///
/// `Ok(None)` means no face was locatable in the patch.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, patch: &FacePatch) -> Result<Option<Embedding>, EmbedderError>;
}

/// Append-only activity log. Rows are never rewritten.
pub trait LogAppender: Send {
    fn append(&mut self, record: &LogRecord) -> Result<(), AppendError>;
}

/// Persists evidence snapshots, organized by calendar date then
/// time-of-capture (`<base>/<YYYY-MM-DD>/<HH-MM-SS>.jpg`).
pub trait SnapshotStore: Send {
    fn save(&mut self, frame: &Frame, taken_at: DateTime<Utc>) -> Result<PathBuf, SnapshotError>;
}

/// Optional alert delivery; absence is a valid configuration.
pub trait AlertChannel: Send {
    fn notify(&mut self, alert: &Alert) -> Result<(), AlertError>;
}
