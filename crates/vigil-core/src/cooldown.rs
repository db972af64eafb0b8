//! Temporal deduplication: per-identity cooldown state machine.

use crate::types::{Embedding, Identity};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CooldownEntry {
    last_action: Instant,
    /// Embedding that triggered the current cooldown. Retained only for
    /// `Unknown`, where it backs the different-stranger override.
    trigger: Option<Embedding>,
}

/// Per-identity two-state machine: Quiet (no recent action) and Cooling
/// (action dispatched within the window). The Cooling to Quiet transition
/// is evaluated lazily at each query; there are no timers.
///
/// Known identities and the `Unknown` bucket cool for different windows:
/// the unknown window is the short re-check interval after which a stranger
/// is worth capturing again. While the `Unknown` bucket is Cooling, a new
/// stranger whose embedding differs from the triggering one by more than
/// the re-identification threshold still acts; the cooldown suppresses
/// repeated captures of the same stranger, not all strangers.
///
/// State grows by at most one entry per distinct label ever seen. Single
/// writer: only the controller thread touches this.
pub struct CooldownTracker {
    known_window: Duration,
    unknown_window: Duration,
    reid_threshold: f32,
    entries: HashMap<Identity, CooldownEntry>,
}

impl CooldownTracker {
    pub fn new(known_window: Duration, unknown_window: Duration, reid_threshold: f32) -> Self {
        Self {
            known_window,
            unknown_window,
            reid_threshold,
            entries: HashMap::new(),
        }
    }

    fn window_for(&self, identity: &Identity) -> Duration {
        if identity.is_unknown() {
            self.unknown_window
        } else {
            self.known_window
        }
    }

    /// Pure query: would an action for this classification be admitted now?
    ///
    /// Never mutates state; a `should_act` without a following [`record`]
    /// leaves the tracker exactly as it was.
    ///
    /// [`record`]: CooldownTracker::record
    pub fn should_act(&self, identity: &Identity, probe: Option<&Embedding>, now: Instant) -> bool {
        let Some(entry) = self.entries.get(identity) else {
            return true;
        };

        if now.duration_since(entry.last_action) >= self.window_for(identity) {
            return true;
        }

        // Unknown-bucket override: a materially different face acts even
        // while Cooling. With no embedding on either side the comparison is
        // impossible and the event stays suppressed.
        if identity.is_unknown() {
            if let (Some(trigger), Some(probe)) = (entry.trigger.as_ref(), probe) {
                return trigger.euclidean_distance(probe) > self.reid_threshold;
            }
        }

        false
    }

    /// Record a dispatched action: the Quiet to Cooling transition.
    pub fn record(&mut self, identity: Identity, probe: Option<&Embedding>, now: Instant) {
        let trigger = if identity.is_unknown() { probe.cloned() } else { None };
        self.entries.insert(identity, CooldownEntry { last_action: now, trigger });
    }

    /// Number of distinct labels ever acted on.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: Duration = Duration::from_secs(300);
    const UNKNOWN: Duration = Duration::from_secs(30);

    fn tracker() -> CooldownTracker {
        CooldownTracker::new(KNOWN, UNKNOWN, 0.6)
    }

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    #[test]
    fn test_first_action_admitted() {
        let t = tracker();
        assert!(t.should_act(&Identity::Known("deepak".into()), None, Instant::now()));
    }

    #[test]
    fn test_repeat_within_window_suppressed() {
        // Scenario: "deepak" acts, then reappears one second later.
        let mut t = tracker();
        let id = Identity::Known("deepak".into());
        let t0 = Instant::now();
        t.record(id.clone(), None, t0);
        assert!(!t.should_act(&id, None, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_window_elapse_readmits() {
        let mut t = tracker();
        let id = Identity::Known("deepak".into());
        let t0 = Instant::now();
        t.record(id.clone(), None, t0);
        assert!(!t.should_act(&id, None, t0 + Duration::from_secs(299)));
        assert!(t.should_act(&id, None, t0 + Duration::from_secs(300)));
    }

    #[test]
    fn test_should_act_is_pure() {
        let t = tracker();
        let id = Identity::Known("deepak".into());
        let now = Instant::now();
        for _ in 0..3 {
            assert!(t.should_act(&id, None, now));
        }
        assert_eq!(t.tracked(), 0);
    }

    #[test]
    fn test_labels_cool_independently() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.record(Identity::Known("deepak".into()), None, t0);
        assert!(t.should_act(&Identity::Known("mira".into()), None, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_unknown_uses_short_window() {
        let mut t = tracker();
        let probe = emb(vec![0.0, 0.0]);
        let t0 = Instant::now();
        t.record(Identity::Unknown, Some(&probe), t0);
        assert!(!t.should_act(&Identity::Unknown, Some(&probe), t0 + Duration::from_secs(29)));
        assert!(t.should_act(&Identity::Unknown, Some(&probe), t0 + Duration::from_secs(30)));
    }

    #[test]
    fn test_different_stranger_overrides_cooldown() {
        // Scenario: a second, visually distinct stranger arrives 10 seconds
        // after the first one triggered the Unknown cooldown.
        let mut t = tracker();
        let first = emb(vec![0.0, 0.0]);
        let second = emb(vec![1.0, 0.0]); // distance 1.0 > 0.6
        let t0 = Instant::now();
        t.record(Identity::Unknown, Some(&first), t0);
        assert!(t.should_act(&Identity::Unknown, Some(&second), t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_same_stranger_stays_suppressed() {
        let mut t = tracker();
        let first = emb(vec![0.0, 0.0]);
        let near = emb(vec![0.1, 0.0]); // distance 0.1 <= 0.6
        let t0 = Instant::now();
        t.record(Identity::Unknown, Some(&first), t0);
        assert!(!t.should_act(&Identity::Unknown, Some(&near), t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_override_needs_both_embeddings() {
        let mut t = tracker();
        let first = emb(vec![0.0, 0.0]);
        let t0 = Instant::now();

        // Trigger had an embedding, the new event does not.
        t.record(Identity::Unknown, Some(&first), t0);
        assert!(!t.should_act(&Identity::Unknown, None, t0 + Duration::from_secs(10)));

        // Trigger had none (face was not locatable), new event has one.
        let mut t = tracker();
        t.record(Identity::Unknown, None, t0);
        assert!(!t.should_act(&Identity::Unknown, Some(&first), t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_record_overwrites_trigger() {
        let mut t = tracker();
        let first = emb(vec![0.0, 0.0]);
        let second = emb(vec![1.0, 0.0]);
        let t0 = Instant::now();

        t.record(Identity::Unknown, Some(&first), t0);
        t.record(Identity::Unknown, Some(&second), t0 + Duration::from_secs(10));

        // The second stranger is now the cooldown trigger, so the first one
        // returning is again "materially different" and admitted.
        assert!(t.should_act(&Identity::Unknown, Some(&first), t0 + Duration::from_secs(15)));
        // A near-duplicate of the second is suppressed.
        let near_second = emb(vec![1.05, 0.0]);
        assert!(!t.should_act(&Identity::Unknown, Some(&near_second), t0 + Duration::from_secs(15)));
    }

    #[test]
    fn test_one_entry_per_label() {
        let mut t = tracker();
        let t0 = Instant::now();
        for i in 0..5 {
            t.record(Identity::Known("deepak".into()), None, t0 + Duration::from_secs(i * 400));
        }
        t.record(Identity::Unknown, None, t0);
        assert_eq!(t.tracked(), 2);
    }
}
