//! Frame admission: rate control and dark-frame rejection.

use crate::types::Frame;

/// Why a captured frame was dropped before any model ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Not the Nth frame of the sampling stride.
    StrideSkip,
    /// Mean brightness below the dark threshold.
    TooDark { brightness: f32 },
}

/// Outcome of [`FrameSampler::admit`].
#[derive(Debug)]
pub enum Admission {
    Admitted(Frame),
    Rejected(RejectReason),
}

/// Admits every Nth captured frame, then rejects frames too dark to be
/// worth a detector call. Rejected frames are never reprocessed.
pub struct FrameSampler {
    stride: u64,
    dark_threshold: f32,
    seen: u64,
}

impl FrameSampler {
    pub fn new(stride: u32, dark_threshold: f32) -> Self {
        Self {
            stride: stride.max(1) as u64,
            dark_threshold,
            seen: 0,
        }
    }

    /// Admit or reject one captured frame.
    ///
    /// The brightness gate runs only on frames that survive the stride, so
    /// the per-pixel scan is paid once every `stride` captures.
    pub fn admit(&mut self, frame: Frame) -> Admission {
        self.seen += 1;
        if self.seen % self.stride != 0 {
            return Admission::Rejected(RejectReason::StrideSkip);
        }

        let brightness = frame.mean_brightness();
        if brightness < self.dark_threshold {
            return Admission::Rejected(RejectReason::TooDark { brightness });
        }

        Admission::Admitted(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Instant;

    fn frame_with_brightness(level: u8) -> Frame {
        Frame {
            data: vec![level; 64],
            width: 8,
            height: 8,
            captured_at: Utc::now(),
            instant: Instant::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_stride_admits_every_nth() {
        let mut sampler = FrameSampler::new(5, 10.0);
        let mut admitted = Vec::new();
        for i in 1..=12u64 {
            if let Admission::Admitted(_) = sampler.admit(frame_with_brightness(120)) {
                admitted.push(i);
            }
        }
        assert_eq!(admitted, vec![5, 10]);
    }

    #[test]
    fn test_stride_one_admits_all() {
        let mut sampler = FrameSampler::new(1, 10.0);
        for _ in 0..4 {
            assert!(matches!(sampler.admit(frame_with_brightness(120)), Admission::Admitted(_)));
        }
    }

    #[test]
    fn test_stride_zero_clamped_to_one() {
        let mut sampler = FrameSampler::new(0, 10.0);
        assert!(matches!(sampler.admit(frame_with_brightness(120)), Admission::Admitted(_)));
    }

    #[test]
    fn test_dark_frame_rejected() {
        let mut sampler = FrameSampler::new(1, 10.0);
        match sampler.admit(frame_with_brightness(3)) {
            Admission::Rejected(RejectReason::TooDark { brightness }) => {
                assert!((brightness - 3.0).abs() < 1e-6);
            }
            other => panic!("expected dark rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_brightness_at_threshold_admitted() {
        let mut sampler = FrameSampler::new(1, 10.0);
        assert!(matches!(sampler.admit(frame_with_brightness(10)), Admission::Admitted(_)));
    }

    #[test]
    fn test_dark_check_skipped_for_stride_drops() {
        // A dark frame dropped by the stride reports StrideSkip, not TooDark.
        let mut sampler = FrameSampler::new(2, 10.0);
        match sampler.admit(frame_with_brightness(3)) {
            Admission::Rejected(RejectReason::StrideSkip) => {}
            other => panic!("expected stride skip, got {other:?}"),
        }
    }
}
