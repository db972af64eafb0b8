//! Bounded single-slot frame buffer between capture and the pipeline.
//!
//! The producer thread always overwrites the slot with the latest frame;
//! an unconsumed older frame is simply dropped. The controller therefore
//! never works through a stale backlog, and memory is capped at one frame.

use crate::camera::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use vigil_core::error::CaptureError;
use vigil_core::traits::FrameSource;
use vigil_core::Frame;

struct SlotState {
    frame: Option<Frame>,
    closed: bool,
}

/// Single-slot latest-frame buffer. One producer, one consumer.
pub struct FrameSlot {
    state: Mutex<SlotState>,
    available: Condvar,
}

impl FrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState { frame: None, closed: false }),
            available: Condvar::new(),
        })
    }

    /// Publish a frame, replacing any unconsumed one.
    pub fn publish(&self, frame: Frame) {
        let mut state = self.state.lock().unwrap();
        if state.frame.is_some() {
            tracing::trace!("dropping unconsumed frame");
        }
        state.frame = Some(frame);
        drop(state);
        self.available.notify_one();
    }

    /// Mark the slot closed; the consumer sees `CaptureError::Closed` once
    /// the last published frame is drained.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.available.notify_all();
    }

    /// Take the latest frame, waiting up to `timeout`.
    ///
    /// `Ok(None)` on timeout; `Err(Closed)` once the producer is gone and
    /// nothing is left to consume.
    pub fn take(&self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();

        loop {
            if let Some(frame) = state.frame.take() {
                return Ok(Some(frame));
            }
            if state.closed {
                return Err(CaptureError::Closed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let (next, wait) = self.available.wait_timeout(state, remaining).unwrap();
            state = next;
            if wait.timed_out() && state.frame.is_none() && !state.closed {
                return Ok(None);
            }
        }
    }
}

/// `FrameSource` adapter over a [`FrameSlot`].
pub struct SlotSource(Arc<FrameSlot>);

impl SlotSource {
    pub fn new(slot: Arc<FrameSlot>) -> Self {
        Self(slot)
    }
}

impl FrameSource for SlotSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        self.0.take(timeout)
    }
}

/// Spawn the capture producer on a dedicated OS thread.
///
/// The thread streams frames from the camera into the slot until the
/// shutdown flag is raised. Capture errors are transient: the stream is
/// torn down, the thread backs off briefly and reopens it. The slot is
/// closed when the thread exits.
pub fn spawn_capture_thread(
    camera: Camera,
    slot: Arc<FrameSlot>,
    warmup_frames: usize,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("vigil-capture".into())
        .spawn(move || {
            tracing::info!(device = %camera.device_path, "capture thread started");
            let mut warmup = warmup_frames;

            while !shutdown.load(Ordering::Relaxed) {
                let keep_going = {
                    let shutdown = shutdown.clone();
                    move || !shutdown.load(Ordering::Relaxed)
                };
                let result = camera.stream_frames(warmup, keep_going, |frame| slot.publish(frame));
                // Warmup is only owed to the first stream setup.
                warmup = 0;

                if let Err(e) = result {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    tracing::warn!(error = %e, "capture stream failed, reopening");
                    std::thread::sleep(Duration::from_millis(250));
                }
            }

            slot.close();
            tracing::info!("capture thread exiting");
        })
        .expect("failed to spawn capture thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(sequence: u64) -> Frame {
        Frame {
            data: vec![128; 16],
            width: 4,
            height: 4,
            captured_at: Utc::now(),
            instant: Instant::now(),
            sequence,
        }
    }

    #[test]
    fn test_take_returns_published_frame() {
        let slot = FrameSlot::new();
        slot.publish(frame(7));
        let taken = slot.take(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(taken.sequence, 7);
    }

    #[test]
    fn test_newer_frame_replaces_unconsumed() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        let taken = slot.take(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(taken.sequence, 2);
        // Slot is drained: the replaced frame is gone, not queued.
        assert!(slot.take(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_take_times_out_when_empty() {
        let slot = FrameSlot::new();
        assert!(slot.take(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_closed_empty_slot_reports_closed() {
        let slot = FrameSlot::new();
        slot.close();
        assert!(matches!(slot.take(Duration::from_millis(5)), Err(CaptureError::Closed)));
    }

    #[test]
    fn test_last_frame_drains_before_closed() {
        let slot = FrameSlot::new();
        slot.publish(frame(3));
        slot.close();
        assert!(slot.take(Duration::from_millis(5)).unwrap().is_some());
        assert!(matches!(slot.take(Duration::from_millis(5)), Err(CaptureError::Closed)));
    }

    #[test]
    fn test_take_wakes_on_cross_thread_publish() {
        let slot = FrameSlot::new();
        let producer = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                slot.publish(frame(9));
            })
        };
        let taken = slot.take(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(taken.sequence, 9);
        producer.join().unwrap();
    }
}
