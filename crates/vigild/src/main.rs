use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_core::traits::AlertChannel;
use vigil_core::{
    ActionDispatcher, CooldownTracker, FrameSampler, IdentityResolver, PipelineController,
    PipelineTiming, PresenceGate,
};
use vigil_hw::{spawn_capture_thread, Camera, FrameSlot, SlotSource};
use vigil_ml::{ArcFaceEmbedder, YoloPersonDetector};
use vigil_store::GalleryStore;

mod config;
mod effects;

use config::Config;
use effects::{CsvActivityLog, JpegSnapshotStore, WebhookAlertChannel};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = Config::load().context("loading configuration")?;

    // Startup is fail-fast: camera, models, and gallery must all be
    // available before the loop starts.
    let store = GalleryStore::open(&config.db_path)
        .with_context(|| format!("opening gallery store {}", config.db_path.display()))?;
    let gallery = store.load_gallery().context("loading gallery")?;
    if gallery.is_empty() {
        tracing::warn!("gallery is empty; every visitor will resolve to Unknown");
    }

    let detector = YoloPersonDetector::load(&config.detector_model.to_string_lossy())
        .context("loading person detection model")?;
    let embedder = ArcFaceEmbedder::load(&config.embedder_model.to_string_lossy())
        .context("loading face embedding model")?;

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("opening camera {}", config.camera_device))?;

    let log = CsvActivityLog::open(config.log_path.clone()).context("opening activity log")?;
    let snapshots = JpegSnapshotStore::new(config.snapshot_dir.clone());
    let alerts: Option<Box<dyn AlertChannel>> = match &config.alert_webhook {
        Some(url) => {
            tracing::info!(url = %url, "alerting enabled");
            Some(Box::new(WebhookAlertChannel::new(url.clone(), config.alert_timeout)))
        }
        None => None,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let slot = FrameSlot::new();
    let capture = spawn_capture_thread(
        camera,
        slot.clone(),
        config.warmup_frames,
        shutdown.clone(),
    );

    let mut controller = PipelineController::new(
        FrameSampler::new(config.sample_stride, config.dark_threshold),
        PresenceGate::new(detector, config.presence_threshold),
        IdentityResolver::new(embedder, gallery, config.match_tolerance),
        CooldownTracker::new(
            config.known_cooldown,
            config.unknown_cooldown,
            config.reid_threshold,
        ),
        ActionDispatcher::new(
            Box::new(log),
            Box::new(snapshots),
            alerts,
            config.save_unknown_only,
        ),
        PipelineTiming {
            capture_timeout: config.capture_timeout,
            idle_backoff: config.idle_backoff,
        },
        shutdown.clone(),
    );

    let mut source = SlotSource::new(slot);
    let pipeline = std::thread::Builder::new()
        .name("vigil-pipeline".into())
        .spawn(move || controller.run(&mut source))
        .expect("failed to spawn pipeline thread");

    tracing::info!("vigild ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");
    shutdown.store(true, Ordering::Relaxed);

    let stats = pipeline.join().map_err(|_| anyhow!("pipeline thread panicked"))?;
    capture.join().map_err(|_| anyhow!("capture thread panicked"))?;

    tracing::info!(
        frames_seen = stats.frames_seen,
        frames_admitted = stats.frames_admitted,
        identity_checks = stats.identity_checks,
        dispatches = stats.dispatches,
        "vigild stopped"
    );

    Ok(())
}
