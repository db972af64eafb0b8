//! Concrete effect collaborators: CSV activity log, JPEG snapshot store,
//! webhook alert channel.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use vigil_core::error::{AlertError, AppendError, SnapshotError};
use vigil_core::traits::{AlertChannel, LogAppender, SnapshotStore};
use vigil_core::{Alert, Frame, LogRecord};

const LOG_HEADER: &str = "timestamp,label,image_path";

/// Append-only CSV activity log. One row per dispatched action; rows are
/// never rewritten.
pub struct CsvActivityLog {
    path: PathBuf,
}

impl CsvActivityLog {
    /// Open the log, writing the header row if the file does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            std::fs::write(&path, format!("{LOG_HEADER}\n"))
                .with_context(|| format!("initializing activity log {}", path.display()))?;
        }
        Ok(Self { path })
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl LogAppender for CsvActivityLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), AppendError> {
        let path_field = record
            .snapshot_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let row = format!(
            "{},{},{}\n",
            record.timestamp.to_rfc3339(),
            csv_field(&record.label),
            csv_field(&path_field),
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppendError(format!("{}: {e}", self.path.display())))?;
        file.write_all(row.as_bytes())
            .map_err(|e| AppendError(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Writes evidence JPEGs under `<base>/<YYYY-MM-DD>/<HH-MM-SS>.jpg`,
/// creating the date directory on demand. Paths use local time, matching
/// how an operator browses the evidence tree.
pub struct JpegSnapshotStore {
    base_dir: PathBuf,
}

impl JpegSnapshotStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn snapshot_path(&self, taken_at: DateTime<Utc>) -> PathBuf {
        let local = taken_at.with_timezone(&Local);
        self.base_dir
            .join(local.format("%Y-%m-%d").to_string())
            .join(format!("{}.jpg", local.format("%H-%M-%S")))
    }
}

impl SnapshotStore for JpegSnapshotStore {
    fn save(&mut self, frame: &Frame, taken_at: DateTime<Utc>) -> Result<PathBuf, SnapshotError> {
        let path = self.snapshot_path(taken_at);
        let date_dir = path.parent().ok_or_else(|| {
            SnapshotError(format!("no parent directory for {}", path.display()))
        })?;
        std::fs::create_dir_all(date_dir)
            .map_err(|e| SnapshotError(format!("{}: {e}", date_dir.display())))?;

        let gray = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| {
                SnapshotError(format!(
                    "frame buffer does not match {}x{}",
                    frame.width, frame.height
                ))
            })?;
        gray.save(&path)
            .map_err(|e| SnapshotError(format!("{}: {e}", path.display())))?;

        Ok(path)
    }
}

/// POSTs alert events as JSON to a configured webhook.
pub struct WebhookAlertChannel {
    agent: ureq::Agent,
    url: String,
}

impl WebhookAlertChannel {
    pub fn new(url: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, url }
    }
}

fn alert_payload(alert: &Alert) -> serde_json::Value {
    serde_json::json!({
        "event": "person_detected",
        "timestamp": alert.timestamp.to_rfc3339(),
        "label": alert.label,
        "snapshot": alert.snapshot_path.as_ref().map(|p| p.to_string_lossy()),
    })
}

impl AlertChannel for WebhookAlertChannel {
    fn notify(&mut self, alert: &Alert) -> Result<(), AlertError> {
        self.agent
            .post(&self.url)
            .send_json(alert_payload(alert))
            .map_err(|e| AlertError(format!("{}: {e}", self.url)))?;
        Ok(())
    }
}
