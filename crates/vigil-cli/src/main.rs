use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil_core::FacePatch;
use vigil_hw::Camera;
use vigil_ml::ArcFaceEmbedder;
use vigil_store::GalleryStore;

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil watch daemon CLI")]
struct Cli {
    /// Path to the gallery database.
    #[arg(long, default_value = "faces.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a known face from a photo
    Enroll {
        /// Label for this person (e.g., "deepak")
        #[arg(short, long)]
        label: String,
        /// Path to a portrait photo
        #[arg(short, long)]
        image: PathBuf,
        /// Path to the face embedding ONNX model
        #[arg(long, default_value = "models/w600k_r50.onnx")]
        model: PathBuf,
    },
    /// List enrolled face models
    List,
    /// Remove an enrolled face model
    Remove {
        /// Model ID to remove
        id: String,
    },
    /// List available capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enroll { label, image, model } => enroll(&cli.db, &label, &image, &model),
        Commands::List => list(&cli.db),
        Commands::Remove { id } => remove(&cli.db, &id),
        Commands::Devices => {
            devices();
            Ok(())
        }
    }
}

/// Embed a portrait photo and store it under the given label.
///
/// The whole photo is embedded directly; enrollment photos are expected to
/// be face portraits, not room scenes.
fn enroll(db: &PathBuf, label: &str, image_path: &PathBuf, model: &PathBuf) -> Result<()> {
    let photo = image::open(image_path)
        .with_context(|| format!("reading photo {}", image_path.display()))?
        .to_luma8();

    let patch = FacePatch {
        width: photo.width(),
        height: photo.height(),
        data: photo.into_raw(),
    };

    let mut embedder = ArcFaceEmbedder::load(&model.to_string_lossy())
        .context("loading face embedding model")?;

    let Some(embedding) = embedder.extract(&patch).context("embedding photo")? else {
        bail!(
            "no usable face in {} (image too small?)",
            image_path.display()
        );
    };

    let store = GalleryStore::open(db).context("opening gallery store")?;
    let id = store.insert(label, &embedding)?;

    println!("Enrolled '{label}' as {id}");
    Ok(())
}

fn list(db: &PathBuf) -> Result<()> {
    let store = GalleryStore::open(db).context("opening gallery store")?;
    let gallery = store.load_gallery()?;

    if gallery.is_empty() {
        println!("No faces enrolled");
        return Ok(());
    }

    for entry in gallery {
        println!(
            "{}  {:20}  enrolled {}",
            entry.id,
            entry.label,
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn remove(db: &PathBuf, id: &str) -> Result<()> {
    let store = GalleryStore::open(db).context("opening gallery store")?;
    store.remove(id)?;
    println!("Removed {id}");
    Ok(())
}

fn devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No capture devices found");
        return;
    }
    for info in devices {
        println!("{}  {} ({})", info.path, info.name, info.driver);
    }
}
