//! Action dispatch: one classification event fans out into effects.

use crate::traits::{AlertChannel, LogAppender, SnapshotStore};
use crate::types::{ActionEvent, Alert, Frame, LogRecord};
use std::path::PathBuf;

/// What a dispatch actually accomplished. Effects are attempted
/// independently; a failed one leaves the others standing.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub snapshot_path: Option<PathBuf>,
    pub log_appended: bool,
    pub alerted: bool,
}

/// Converts an admitted, de-duplicated classification into concrete
/// effects: append a log row (always), persist a snapshot (unknown faces
/// by default), and raise an alert (unknown faces, when a channel is
/// configured).
pub struct ActionDispatcher {
    log: Box<dyn LogAppender>,
    snapshots: Box<dyn SnapshotStore>,
    alerts: Option<Box<dyn AlertChannel>>,
    save_unknown_only: bool,
}

impl ActionDispatcher {
    pub fn new(
        log: Box<dyn LogAppender>,
        snapshots: Box<dyn SnapshotStore>,
        alerts: Option<Box<dyn AlertChannel>>,
        save_unknown_only: bool,
    ) -> Self {
        Self { log, snapshots, alerts, save_unknown_only }
    }

    /// Dispatch one event. Failures are logged and reflected in the
    /// outcome; completed effects are never rolled back.
    pub fn dispatch(&mut self, event: &ActionEvent, frame: &Frame) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let wants_snapshot = event.identity.is_unknown() || !self.save_unknown_only;
        if wants_snapshot {
            match self.snapshots.save(frame, event.timestamp) {
                Ok(path) => {
                    tracing::info!(identity = %event.identity, path = %path.display(), "snapshot saved");
                    outcome.snapshot_path = Some(path);
                }
                Err(e) => {
                    tracing::warn!(identity = %event.identity, error = %e, "snapshot save failed");
                }
            }
        }

        // The log row is attempted regardless of snapshot success, with the
        // path column empty when no snapshot was persisted.
        let record = LogRecord {
            timestamp: event.timestamp,
            label: event.identity.to_string(),
            snapshot_path: outcome.snapshot_path.clone(),
        };
        match self.log.append(&record) {
            Ok(()) => outcome.log_appended = true,
            Err(e) => tracing::warn!(identity = %event.identity, error = %e, "log append failed"),
        }

        if event.identity.is_unknown() {
            if let Some(alerts) = self.alerts.as_mut() {
                let alert = Alert {
                    timestamp: event.timestamp,
                    label: event.identity.to_string(),
                    snapshot_path: outcome.snapshot_path.clone(),
                };
                match alerts.notify(&alert) {
                    Ok(()) => outcome.alerted = true,
                    Err(e) => tracing::warn!(error = %e, "alert delivery failed"),
                }
            }
        }

        outcome
    }
}
