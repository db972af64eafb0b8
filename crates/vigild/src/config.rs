//! Daemon configuration: TOML file with per-field defaults.
//!
//! The file is located via `VIGIL_CONFIG`, falling back to `vigil.toml` in
//! the working directory; a missing file yields the defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "vigil.toml";
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 2000;
const DEFAULT_WARMUP_FRAMES: usize = 4;
const DEFAULT_SAMPLE_STRIDE: u32 = 5;
const DEFAULT_DARK_THRESHOLD: f32 = 10.0;
const DEFAULT_DETECTOR_MODEL: &str = "models/yolov8n.onnx";
const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_EMBEDDER_MODEL: &str = "models/w600k_r50.onnx";
const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;
const DEFAULT_KNOWN_COOLDOWN_SECS: u64 = 300;
const DEFAULT_UNKNOWN_COOLDOWN_SECS: u64 = 30;
const DEFAULT_IDLE_BACKOFF_MS: u64 = 100;
const DEFAULT_LOG_PATH: &str = "activity_log.csv";
const DEFAULT_SNAPSHOT_DIR: &str = "intruders";
const DEFAULT_ALERT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DB_PATH: &str = "faces.db";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    camera: Option<CameraFile>,
    sampler: Option<SamplerFile>,
    detection: Option<DetectionFile>,
    identity: Option<IdentityFile>,
    cooldown: Option<CooldownFile>,
    pipeline: Option<PipelineFile>,
    actions: Option<ActionsFile>,
    alert: Option<AlertFile>,
    gallery: Option<GalleryFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraFile {
    device: Option<String>,
    capture_timeout_ms: Option<u64>,
    warmup_frames: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SamplerFile {
    stride: Option<u32>,
    dark_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionFile {
    model_path: Option<String>,
    presence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct IdentityFile {
    model_path: Option<String>,
    match_tolerance: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CooldownFile {
    known_secs: Option<u64>,
    unknown_secs: Option<u64>,
    reid_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineFile {
    idle_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ActionsFile {
    log_path: Option<String>,
    snapshot_dir: Option<String>,
    save_unknown_only: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertFile {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GalleryFile {
    db_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub camera_device: String,
    pub capture_timeout: Duration,
    pub warmup_frames: usize,
    pub sample_stride: u32,
    pub dark_threshold: f32,
    pub detector_model: PathBuf,
    pub presence_threshold: f32,
    pub embedder_model: PathBuf,
    pub match_tolerance: f32,
    pub known_cooldown: Duration,
    pub unknown_cooldown: Duration,
    pub reid_threshold: f32,
    pub idle_backoff: Duration,
    pub log_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub save_unknown_only: bool,
    /// `None` when alerting is disabled or no URL is configured.
    pub alert_webhook: Option<String>,
    pub alert_timeout: Duration,
    pub db_path: PathBuf,
}

impl Config {
    /// Load from `VIGIL_CONFIG`, falling back to `vigil.toml`, falling back
    /// to defaults when neither exists.
    pub fn load() -> Result<Self> {
        match std::env::var("VIGIL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Self::resolve(ConfigFile::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw).context("parsing config file")?;
        Self::resolve(file)
    }

    fn resolve(file: ConfigFile) -> Result<Self> {
        let camera = file.camera.unwrap_or_default();
        let sampler = file.sampler.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let identity = file.identity.unwrap_or_default();
        let cooldown = file.cooldown.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        let actions = file.actions.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let gallery = file.gallery.unwrap_or_default();

        let presence_threshold =
            detection.presence_threshold.unwrap_or(DEFAULT_PRESENCE_THRESHOLD);
        if !(0.0..=1.0).contains(&presence_threshold) {
            bail!("detection.presence_threshold must be within [0, 1], got {presence_threshold}");
        }

        let match_tolerance = identity.match_tolerance.unwrap_or(DEFAULT_MATCH_TOLERANCE);
        if match_tolerance < 0.0 {
            bail!("identity.match_tolerance must be non-negative, got {match_tolerance}");
        }

        let sample_stride = sampler.stride.unwrap_or(DEFAULT_SAMPLE_STRIDE);
        if sample_stride == 0 {
            bail!("sampler.stride must be at least 1");
        }

        let alert_enabled = alert.enabled.unwrap_or(false);
        let alert_webhook = match (alert_enabled, alert.webhook_url) {
            (true, Some(url)) => Some(url),
            (true, None) => bail!("alert.enabled is set but alert.webhook_url is missing"),
            (false, _) => None,
        };

        Ok(Self {
            camera_device: camera.device.unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            capture_timeout: Duration::from_millis(
                camera.capture_timeout_ms.unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS),
            ),
            warmup_frames: camera.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            sample_stride,
            dark_threshold: sampler.dark_threshold.unwrap_or(DEFAULT_DARK_THRESHOLD),
            detector_model: detection
                .model_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTOR_MODEL)),
            presence_threshold,
            embedder_model: identity
                .model_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EMBEDDER_MODEL)),
            match_tolerance,
            known_cooldown: Duration::from_secs(
                cooldown.known_secs.unwrap_or(DEFAULT_KNOWN_COOLDOWN_SECS),
            ),
            unknown_cooldown: Duration::from_secs(
                cooldown.unknown_secs.unwrap_or(DEFAULT_UNKNOWN_COOLDOWN_SECS),
            ),
            // The re-identification threshold rides the match tolerance
            // unless set explicitly.
            reid_threshold: cooldown.reid_threshold.unwrap_or(match_tolerance),
            idle_backoff: Duration::from_millis(
                pipeline.idle_backoff_ms.unwrap_or(DEFAULT_IDLE_BACKOFF_MS),
            ),
            log_path: actions
                .log_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
            snapshot_dir: actions
                .snapshot_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            save_unknown_only: actions.save_unknown_only.unwrap_or(true),
            alert_webhook,
            alert_timeout: Duration::from_millis(
                alert.timeout_ms.unwrap_or(DEFAULT_ALERT_TIMEOUT_MS),
            ),
            db_path: gallery
                .db_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        })
    }
}
