//! Presence gate: the cheap filter in front of all face work.

use crate::error::DetectorError;
use crate::traits::PersonDetector;
use crate::types::{DetectionResult, Frame};

/// Asks the person detector whether a human is present above a confidence
/// threshold. Stateless across calls; when the scene is empty this gate is
/// where almost all pipeline time is spent.
pub struct PresenceGate<D: PersonDetector> {
    detector: D,
    threshold: f32,
}

impl<D: PersonDetector> PresenceGate<D> {
    pub fn new(detector: D, threshold: f32) -> Self {
        Self { detector, threshold }
    }

    /// Run detection and select the maximum-confidence candidate.
    pub fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectorError> {
        let detections = self.detector.locate_persons(frame)?;

        let best = detections
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        Ok(match best {
            Some(d) => DetectionResult {
                person_present: d.confidence >= self.threshold,
                confidence: d.confidence,
                region: Some(d.region),
            },
            None => DetectionResult {
                person_present: false,
                confidence: 0.0,
                region: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PersonDetection, Region};
    use chrono::Utc;
    use std::time::Instant;

    struct FixedDetector(Vec<PersonDetection>);

    impl PersonDetector for FixedDetector {
        fn locate_persons(&mut self, _frame: &Frame) -> Result<Vec<PersonDetection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    fn frame() -> Frame {
        Frame {
            data: vec![120; 16],
            width: 4,
            height: 4,
            captured_at: Utc::now(),
            instant: Instant::now(),
            sequence: 0,
        }
    }

    fn det(confidence: f32, x: f32) -> PersonDetection {
        PersonDetection {
            confidence,
            region: Region { x, y: 0.0, width: 10.0, height: 20.0 },
        }
    }

    #[test]
    fn test_selects_max_confidence() {
        let mut gate = PresenceGate::new(FixedDetector(vec![det(0.6, 1.0), det(0.9, 2.0), det(0.7, 3.0)]), 0.5);
        let result = gate.detect(&frame()).unwrap();
        assert!(result.person_present);
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.region.unwrap().x, 2.0);
    }

    #[test]
    fn test_below_threshold_not_present() {
        let mut gate = PresenceGate::new(FixedDetector(vec![det(0.4, 1.0)]), 0.5);
        let result = gate.detect(&frame()).unwrap();
        assert!(!result.person_present);
        assert!((result.confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_at_threshold_present() {
        let mut gate = PresenceGate::new(FixedDetector(vec![det(0.5, 1.0)]), 0.5);
        assert!(gate.detect(&frame()).unwrap().person_present);
    }

    #[test]
    fn test_no_detections() {
        let mut gate = PresenceGate::new(FixedDetector(vec![]), 0.5);
        let result = gate.detect(&frame()).unwrap();
        assert!(!result.person_present);
        assert_eq!(result.confidence, 0.0);
        assert!(result.region.is_none());
    }
}
