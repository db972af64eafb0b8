//! Error taxonomy for the pipeline and its collaborator seams.
//!
//! Per-frame failures are transient: the controller logs them and moves on
//! to the next frame. Only startup failures (camera open, model load,
//! gallery load) are fatal, and those surface from the binaries before the
//! loop starts.

use thiserror::Error;

/// Frame acquisition failure. A capture timeout is not an error; it is
/// reported as `Ok(None)` by [`crate::traits::FrameSource::next_frame`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame source closed")]
    Closed,
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Person detector collaborator failure.
#[derive(Debug, Error)]
#[error("person detector unavailable: {0}")]
pub struct DetectorError(pub String);

/// Face embedder collaborator failure.
#[derive(Debug, Error)]
#[error("face embedder unavailable: {0}")]
pub struct EmbedderError(pub String);

/// Activity log append failure.
#[derive(Debug, Error)]
#[error("log append failed: {0}")]
pub struct AppendError(pub String);

/// Snapshot persistence failure.
#[derive(Debug, Error)]
#[error("snapshot write failed: {0}")]
pub struct SnapshotError(pub String);

/// Alert delivery failure.
#[derive(Debug, Error)]
#[error("alert delivery failed: {0}")]
pub struct AlertError(pub String);
