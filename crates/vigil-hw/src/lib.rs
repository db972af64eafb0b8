//! vigil-hw — V4L2 camera capture for the watch pipeline.
//!
//! Provides the camera device handle, pixel-format conversion to the
//! grayscale frames the pipeline consumes, and the bounded single-slot
//! buffer that decouples camera I/O from the decision loop.

pub mod camera;
pub mod convert;
pub mod slot;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use slot::{spawn_capture_thread, FrameSlot, SlotSource};
