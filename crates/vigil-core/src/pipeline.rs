//! Pipeline controller: the per-frame sequence and the loop's lifecycle.

use crate::cooldown::CooldownTracker;
use crate::dispatch::ActionDispatcher;
use crate::error::CaptureError;
use crate::gate::PresenceGate;
use crate::resolver::IdentityResolver;
use crate::sampler::{Admission, FrameSampler, RejectReason};
use crate::traits::{FaceEmbedder, FrameSource, PersonDetector};
use crate::types::ActionEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Loop timing knobs.
#[derive(Debug, Clone)]
pub struct PipelineTiming {
    /// How long one capture may block before the iteration is skipped.
    pub capture_timeout: Duration,
    /// Pause after an admitted frame with no person in it.
    pub idle_backoff: Duration,
}

/// Counters reported when the loop exits.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub frames_seen: u64,
    pub frames_admitted: u64,
    pub identity_checks: u64,
    pub dispatches: u64,
    pub capture_timeouts: u64,
    pub detector_failures: u64,
    pub embedder_failures: u64,
}

/// Drives capture → admission → presence → identity → cooldown → dispatch
/// in a fixed order on a single thread. Frames are processed strictly in
/// admission order; there is no cross-frame concurrency.
///
/// Every per-frame failure is recovered locally. The loop ends only on the
/// shutdown signal or when the frame source closes.
pub struct PipelineController<D: PersonDetector, E: FaceEmbedder> {
    sampler: FrameSampler,
    gate: PresenceGate<D>,
    resolver: IdentityResolver<E>,
    cooldown: CooldownTracker,
    dispatcher: ActionDispatcher,
    timing: PipelineTiming,
    shutdown: Arc<AtomicBool>,
    stats: RunStats,
}

impl<D: PersonDetector, E: FaceEmbedder> PipelineController<D, E> {
    pub fn new(
        sampler: FrameSampler,
        gate: PresenceGate<D>,
        resolver: IdentityResolver<E>,
        cooldown: CooldownTracker,
        dispatcher: ActionDispatcher,
        timing: PipelineTiming,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sampler,
            gate,
            resolver,
            cooldown,
            dispatcher,
            timing,
            shutdown,
            stats: RunStats::default(),
        }
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Sleep the idle backoff in short slices so shutdown stays responsive.
    fn idle_pause(&self) {
        const SLICE: Duration = Duration::from_millis(25);
        let mut remaining = self.timing.idle_backoff;
        while !remaining.is_zero() && !self.shutting_down() {
            let step = remaining.min(SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
    }

    /// Run until the shutdown signal is raised or the source closes.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> RunStats {
        tracing::info!("watch pipeline started");

        while !self.shutting_down() {
            let frame = match source.next_frame(self.timing.capture_timeout) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.stats.capture_timeouts += 1;
                    tracing::warn!("capture timed out, skipping iteration");
                    continue;
                }
                Err(CaptureError::Closed) => {
                    tracing::info!("frame source closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "capture failed, skipping iteration");
                    continue;
                }
            };
            self.stats.frames_seen += 1;

            let frame = match self.sampler.admit(frame) {
                Admission::Admitted(frame) => frame,
                Admission::Rejected(RejectReason::StrideSkip) => continue,
                Admission::Rejected(RejectReason::TooDark { brightness }) => {
                    tracing::debug!(brightness, "frame too dark, dropped");
                    continue;
                }
            };
            self.stats.frames_admitted += 1;

            if self.shutting_down() {
                break;
            }

            let detection = match self.gate.detect(&frame) {
                Ok(detection) => detection,
                Err(e) => {
                    self.stats.detector_failures += 1;
                    tracing::warn!(error = %e, "detector failed, frame skipped");
                    continue;
                }
            };

            if !detection.person_present {
                self.idle_pause();
                continue;
            }
            // person_present guarantees a region by construction.
            let Some(region) = detection.region else {
                continue;
            };

            if self.shutting_down() {
                break;
            }

            self.stats.identity_checks += 1;
            let (resolved, probe) = match self.resolver.resolve(&frame, &region) {
                Ok(resolution) => resolution,
                Err(e) => {
                    self.stats.embedder_failures += 1;
                    tracing::warn!(error = %e, "embedder failed, frame skipped");
                    continue;
                }
            };

            if !self.cooldown.should_act(&resolved.identity, probe.as_ref(), frame.instant) {
                tracing::debug!(identity = %resolved.identity, "suppressed by cooldown");
                continue;
            }

            let event = ActionEvent {
                timestamp: frame.captured_at,
                matched: !resolved.identity.is_unknown(),
                identity: resolved.identity,
                distance: resolved.distance,
            };
            let outcome = self.dispatcher.dispatch(&event, &frame);
            self.stats.dispatches += 1;
            self.cooldown.record(event.identity.clone(), probe.as_ref(), frame.instant);

            tracing::info!(
                identity = %event.identity,
                matched = event.matched,
                distance = event.distance,
                snapshot = ?outcome.snapshot_path,
                "action dispatched"
            );
        }

        tracing::info!(
            frames_seen = self.stats.frames_seen,
            frames_admitted = self.stats.frames_admitted,
            identity_checks = self.stats.identity_checks,
            dispatches = self.stats.dispatches,
            "watch pipeline stopped"
        );
        self.stats.clone()
    }
}
