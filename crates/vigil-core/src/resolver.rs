//! Identity resolution against the enrolled gallery.

use crate::error::EmbedderError;
use crate::traits::FaceEmbedder;
use crate::types::{Embedding, Frame, GalleryEntry, Identity, IdentityMatch, Region};

/// Resolves the face inside a detected person region to a gallery identity
/// by nearest Euclidean distance, or to `Unknown` when nothing matches
/// within tolerance.
///
/// The gallery is loaded once at startup and never mutated here. Given the
/// same frame, gallery, and tolerance, resolution is deterministic: ties at
/// equal minimal distance go to the lexicographically first label.
pub struct IdentityResolver<E: FaceEmbedder> {
    embedder: E,
    gallery: Vec<GalleryEntry>,
    tolerance: f32,
}

impl<E: FaceEmbedder> IdentityResolver<E> {
    pub fn new(embedder: E, gallery: Vec<GalleryEntry>, tolerance: f32) -> Self {
        Self { embedder, gallery, tolerance }
    }

    /// Crop the frame to the detected region, embed the face within it, and
    /// match against every gallery entry.
    ///
    /// Returns the match plus the probe embedding (needed downstream for the
    /// unknown-bucket re-identification check). No locatable face yields
    /// `Unknown` at infinite distance rather than an error.
    pub fn resolve(
        &mut self,
        frame: &Frame,
        region: &Region,
    ) -> Result<(IdentityMatch, Option<Embedding>), EmbedderError> {
        let patch = frame.crop(region);

        let Some(probe) = self.embedder.embed(&patch)? else {
            return Ok((
                IdentityMatch { identity: Identity::Unknown, distance: f32::INFINITY },
                None,
            ));
        };

        // Full gallery traversal, no early exit.
        let mut best: Option<(&GalleryEntry, f32)> = None;
        for entry in &self.gallery {
            let distance = probe.euclidean_distance(&entry.embedding);
            let better = match best {
                None => true,
                Some((best_entry, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && entry.label < best_entry.label)
                }
            };
            if better {
                best = Some((entry, distance));
            }
        }

        let matched = match best {
            Some((entry, distance)) if distance <= self.tolerance => IdentityMatch {
                identity: Identity::Known(entry.label.clone()),
                distance,
            },
            Some((_, distance)) => IdentityMatch { identity: Identity::Unknown, distance },
            None => IdentityMatch { identity: Identity::Unknown, distance: f32::INFINITY },
        };

        Ok((matched, Some(probe)))
    }
}
