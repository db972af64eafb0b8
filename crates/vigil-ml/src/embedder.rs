//! ArcFace face embedder via ONNX Runtime.
//!
//! Extracts 512-dimensional embeddings from grayscale face patches cropped
//! out of the detected person region, using a w600k_r50-family model.

use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;
use vigil_core::{Embedding, FacePatch};

// --- Named constants ---
const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric normalization
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";
/// Patches smaller than this per side carry no usable face signal.
const MIN_PATCH_SIDE: u32 = 24;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — download from insightface and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face embedder.
pub struct ArcFaceEmbedder {
    session: Session,
}

impl ArcFaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding from a face patch.
    ///
    /// Returns `None` when the patch is too small to resolve a face, which
    /// the resolver treats as "no face locatable".
    pub fn extract(&mut self, patch: &FacePatch) -> Result<Option<Embedding>, EmbedderError> {
        if patch_too_small(patch.width, patch.height) {
            return Ok(None);
        }

        let gray =
            GrayImage::from_raw(patch.width, patch.height, patch.data.clone()).ok_or_else(|| {
                EmbedderError::InferenceFailed(format!(
                    "patch buffer does not match {}x{}",
                    patch.width, patch.height
                ))
            })?;
        let size = ARCFACE_INPUT_SIZE as u32;
        let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);

        let input = preprocess(resized.as_raw());

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();
        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Some(Embedding {
            values: l2_normalize(raw),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        }))
    }
}

impl vigil_core::FaceEmbedder for ArcFaceEmbedder {
    fn embed(
        &mut self,
        patch: &FacePatch,
    ) -> Result<Option<Embedding>, vigil_core::error::EmbedderError> {
        self.extract(patch)
            .map_err(|e| vigil_core::error::EmbedderError(e.to_string()))
    }
}

fn patch_too_small(width: u32, height: u32) -> bool {
    width < MIN_PATCH_SIDE || height < MIN_PATCH_SIDE
}

/// Preprocess a 112x112 grayscale crop into a NCHW float tensor with
/// symmetric normalization.
fn preprocess(aligned: &[u8]) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = aligned.get(y * size + x).copied().unwrap_or(0) as f32;
            let normalized = (pixel - ARCFACE_MEAN) / ARCFACE_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }

    tensor
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_size_gate() {
        assert!(patch_too_small(10, 100));
        assert!(patch_too_small(100, 10));
        assert!(patch_too_small(0, 0));
        assert!(!patch_too_small(24, 24));
        assert!(!patch_too_small(200, 300));
    }

    #[test]
    fn test_preprocess_normalization_range() {
        // Black maps to -1, white to +1, mid-gray near 0.
        let size = ARCFACE_INPUT_SIZE;
        let mut crop = vec![0u8; size * size];
        crop[0] = 255;
        crop[1] = 128;

        let tensor = preprocess(&crop);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 0, 0, 1]].abs() < 0.01);
        assert!((tensor[[0, 0, 0, 2]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_replicates_channels() {
        let crop = vec![200u8; ARCFACE_INPUT_SIZE * ARCFACE_INPUT_SIZE];
        let tensor = preprocess(&crop);
        for c in 0..3 {
            assert_eq!(tensor[[0, c, 5, 5]], tensor[[0, 0, 5, 5]]);
        }
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
