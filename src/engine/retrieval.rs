//! Single-model retrieval: text, image, and neighbor search.
//!
//! The pipeline is the same for every probe kind: produce a unit-norm query
//! vector, scan the model's index, map ids through the asset map, drop hits
//! below the model's score floor, and collapse duplicate paths to their
//! highest-scoring occurrence. Neighbor search skips the floor so the
//! self-match always survives.

use std::collections::HashSet;

use crate::constants::SENTINEL_ID;
use crate::encode::{image_load, is_zero};
use crate::error::Result;
use crate::types::{Hit, ImageSource, KeyframeId, ModelKind};

use super::Engine;

impl Engine {
    /// Ranked keyframes for a natural-language query in one embedding space.
    /// The query passes through the translator before encoding.
    pub fn text_search(&self, model: ModelKind, query: &str, k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let translated = self.translator().translate(query)?;
        let encoder = self.encoders().get(model)?;
        let vector = encoder.encode_text(&translated)?;
        tracing::debug!(model = %model, k, "text search");
        self.search_vector(model, &vector, k, Some(self.floors().floor(model)))
    }

    /// Ranked keyframes similar to a probe image.
    pub fn image_search(&self, model: ModelKind, source: &ImageSource, k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let encoder = self.encoders().get(model)?;
        let image = image_load::load_rgb(source)?;
        let vector = encoder.encode_image(&image)?;
        tracing::debug!(model = %model, k, source = %source.describe(), "image search");
        self.search_vector(model, &vector, k, Some(self.floors().floor(model)))
    }

    /// Ranked keyframes similar to an already-indexed keyframe. The stored
    /// vector is reconstructed from the index; `UnknownId` propagates
    /// verbatim.
    pub fn neighbor_search(&self, model: ModelKind, id: KeyframeId, k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let index = self.index_of(model)?;
        let vector = index.reconstruct(id)?;
        tracing::debug!(model = %model, id, k, "neighbor search");
        self.search_vector(model, &vector, k, None)
    }

    /// Shared tail of every search: scan, map, floor, dedup.
    pub(crate) fn search_vector(
        &self,
        model: ModelKind,
        vector: &[f32],
        k: usize,
        floor: Option<f32>,
    ) -> Result<Vec<Hit>> {
        // An all-zero vector is a degenerate but valid query; it matches
        // nothing rather than violating the index preconditions.
        if is_zero(vector) {
            tracing::debug!(model = %model, "degenerate zero query vector");
            return Ok(Vec::new());
        }

        let index = self.index_of(model)?;
        let (scores, ids) = index.search(vector, k)?;

        let mut seen: HashSet<&str> = HashSet::with_capacity(k);
        let mut hits = Vec::with_capacity(k);
        for (&score, &id) in scores.iter().zip(&ids) {
            if id == SENTINEL_ID {
                break;
            }
            if floor.is_some_and(|f| score < f) {
                continue;
            }
            let Some(path) = self.assets().path_of(id) else {
                continue;
            };
            // Results arrive in descending score order, so the first
            // occurrence of a path is its highest-scoring one.
            if !seen.insert(path) {
                continue;
            }
            hits.push(Hit {
                score,
                id,
                path: path.to_string(),
                model,
            });
        }
        Ok(hits)
    }
}
