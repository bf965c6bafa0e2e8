//! Multi-model fusion: one search per loaded embedding space, merged into a
//! single ranked list.
//!
//! The default strategy lets raw scores compete directly and keeps the
//! highest-scoring model per asset path. Rank-based strategies (mean rank,
//! reciprocal rank, weighted, Borda) are available for callers that want
//! score-scale-free merging. Every strategy deduplicates by path and sorts
//! descending. A model whose search fails is skipped with a log line; its
//! absence never fabricates results.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use rayon::prelude::*;

use crate::constants::RRF_RANK_OFFSET;
use crate::error::Result;
use crate::types::{FusionMethod, Hit, ImageSource, KeyframeId, ModelKind, ModelSelect};

use super::Engine;

impl Engine {
    /// Text search dispatched on the request-level model selector.
    pub fn text_search_select(
        &self,
        select: ModelSelect,
        query: &str,
        k: usize,
    ) -> Result<Vec<Hit>> {
        match select {
            ModelSelect::One(model) => self.text_search(model, query, k),
            ModelSelect::All => self.multi_text_search(query, k),
        }
    }

    /// Image search dispatched on the request-level model selector.
    pub fn image_search_select(
        &self,
        select: ModelSelect,
        source: &ImageSource,
        k: usize,
    ) -> Result<Vec<Hit>> {
        match select {
            ModelSelect::One(model) => self.image_search(model, source, k),
            ModelSelect::All => self.multi_image_search(source, k),
        }
    }

    /// Neighbor search dispatched on the request-level model selector.
    pub fn neighbor_search_select(
        &self,
        select: ModelSelect,
        id: KeyframeId,
        k: usize,
    ) -> Result<Vec<Hit>> {
        match select {
            ModelSelect::One(model) => self.neighbor_search(model, id, k),
            ModelSelect::All => self.multi_neighbor_search(id, k),
        }
    }

    /// Text search across every servable model, score-fused.
    pub fn multi_text_search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        self.multi_search(k, |model| self.text_search(model, query, k))
    }

    /// Image search across every servable model, score-fused.
    pub fn multi_image_search(&self, source: &ImageSource, k: usize) -> Result<Vec<Hit>> {
        self.multi_search(k, |model| self.image_search(model, source, k))
    }

    /// Neighbor search across every loaded model, score-fused.
    pub fn multi_neighbor_search(&self, id: KeyframeId, k: usize) -> Result<Vec<Hit>> {
        let models = self.models();
        self.multi_search_over(models, k, |model| self.neighbor_search(model, id, k))
    }

    /// Fuse per-model result lists with an explicit strategy.
    #[must_use]
    pub fn fuse_with_method(
        &self,
        per_model: &BTreeMap<ModelKind, Vec<Hit>>,
        method: FusionMethod,
        k: usize,
    ) -> Vec<Hit> {
        match method {
            FusionMethod::Score => fuse_by_score(per_model, k),
            FusionMethod::Rank => fuse_by_rank(per_model, k),
            FusionMethod::ReciprocalRank => fuse_by_reciprocal_rank(per_model, k),
            FusionMethod::Weighted => fuse_by_weighted_score(per_model, self.priorities(), k),
            FusionMethod::Borda => fuse_by_borda(per_model, k),
        }
    }

    fn multi_search<F>(&self, k: usize, search: F) -> Result<Vec<Hit>>
    where
        F: Fn(ModelKind) -> Result<Vec<Hit>> + Sync,
    {
        self.multi_search_over(self.servable_models(), k, search)
    }

    fn multi_search_over<F>(&self, models: Vec<ModelKind>, k: usize, search: F) -> Result<Vec<Hit>>
    where
        F: Fn(ModelKind) -> Result<Vec<Hit>> + Sync,
    {
        if k == 0 || models.is_empty() {
            return Ok(Vec::new());
        }
        let per_model: BTreeMap<ModelKind, Vec<Hit>> = models
            .into_par_iter()
            .filter_map(|model| match search(model) {
                Ok(hits) => Some((model, hits)),
                Err(err) => {
                    tracing::warn!(model = %model, code = err.code(), "model skipped in fusion");
                    None
                }
            })
            .collect();
        Ok(fuse_by_score(&per_model, k))
    }
}

/// Raw scores compete directly; highest-scoring model wins each path.
fn fuse_by_score(per_model: &BTreeMap<ModelKind, Vec<Hit>>, k: usize) -> Vec<Hit> {
    let mut all: Vec<Hit> = per_model.values().flatten().cloned().collect();
    // Model tag then id settle exact score ties deterministically.
    all.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.id.cmp(&b.id))
    });
    dedup_sorted(all, k)
}

/// Inverse mean rank across the lists that surfaced the path.
fn fuse_by_rank(per_model: &BTreeMap<ModelKind, Vec<Hit>>, k: usize) -> Vec<Hit> {
    let mut acc: BTreeMap<String, (Hit, f32, u32)> = BTreeMap::new();
    for hits in per_model.values() {
        for (rank, hit) in hits.iter().enumerate() {
            let entry = acc
                .entry(hit.path.clone())
                .or_insert_with(|| (hit.clone(), 0.0, 0));
            entry.1 += (rank + 1) as f32;
            entry.2 += 1;
        }
    }
    finish_rescored(
        acc.into_values()
            .map(|(hit, rank_sum, n)| (hit, 1.0 / (rank_sum / n as f32 + 1.0))),
        k,
    )
}

/// Reciprocal-rank fusion with the conventional rank offset of 60.
fn fuse_by_reciprocal_rank(per_model: &BTreeMap<ModelKind, Vec<Hit>>, k: usize) -> Vec<Hit> {
    let mut acc: BTreeMap<String, (Hit, f32)> = BTreeMap::new();
    for hits in per_model.values() {
        for (rank, hit) in hits.iter().enumerate() {
            let contribution = 1.0 / (RRF_RANK_OFFSET + rank as f32 + 1.0);
            match acc.entry(hit.path.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((hit.clone(), contribution));
                }
                Entry::Occupied(mut slot) => slot.get_mut().1 += contribution,
            }
        }
    }
    finish_rescored(acc.into_values(), k)
}

/// Scores weighted by per-model priority; missing priorities weigh 1.
fn fuse_by_weighted_score(
    per_model: &BTreeMap<ModelKind, Vec<Hit>>,
    priorities: &BTreeMap<ModelKind, f32>,
    k: usize,
) -> Vec<Hit> {
    let total: f32 = per_model
        .keys()
        .map(|m| priorities.get(m).copied().unwrap_or(1.0))
        .sum();
    if total <= 0.0 {
        return Vec::new();
    }
    let mut acc: BTreeMap<String, (Hit, f32)> = BTreeMap::new();
    for (model, hits) in per_model {
        let weight = priorities.get(model).copied().unwrap_or(1.0) / total;
        for hit in hits {
            match acc.entry(hit.path.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((hit.clone(), hit.score * weight));
                }
                Entry::Occupied(mut slot) => slot.get_mut().1 += hit.score * weight,
            }
        }
    }
    finish_rescored(acc.into_values(), k)
}

/// Positional points: a list of length `n` awards `n - rank` points.
fn fuse_by_borda(per_model: &BTreeMap<ModelKind, Vec<Hit>>, k: usize) -> Vec<Hit> {
    let mut acc: BTreeMap<String, (Hit, f32)> = BTreeMap::new();
    for hits in per_model.values() {
        let max_rank = hits.len();
        for (rank, hit) in hits.iter().enumerate() {
            let points = (max_rank - rank) as f32;
            match acc.entry(hit.path.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((hit.clone(), points));
                }
                Entry::Occupied(mut slot) => slot.get_mut().1 += points,
            }
        }
    }
    finish_rescored(acc.into_values(), k)
}

/// Keep the first (highest) occurrence of each path from a sorted list.
fn dedup_sorted(sorted: Vec<Hit>, k: usize) -> Vec<Hit> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(k);
    for hit in sorted {
        if seen.insert(hit.path.clone()) {
            out.push(hit);
            if out.len() >= k {
                break;
            }
        }
    }
    out
}

/// Stamp recomputed scores onto representative hits and rank them.
fn finish_rescored(rescored: impl Iterator<Item = (Hit, f32)>, k: usize) -> Vec<Hit> {
    let mut out: Vec<Hit> = rescored
        .map(|(mut hit, score)| {
            hit.score = score;
            hit
        })
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    out.truncate(k);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(model: ModelKind, id: u64, path: &str, score: f32) -> Hit {
        Hit {
            score,
            id,
            path: path.to_string(),
            model,
        }
    }

    fn two_models() -> BTreeMap<ModelKind, Vec<Hit>> {
        let mut per_model = BTreeMap::new();
        per_model.insert(
            ModelKind::Clip,
            vec![
                hit(ModelKind::Clip, 0, "v1/001.jpg", 0.9),
                hit(ModelKind::Clip, 1, "v1/002.jpg", 0.5),
            ],
        );
        per_model.insert(
            ModelKind::Beit3,
            vec![
                hit(ModelKind::Beit3, 0, "v1/001.jpg", 0.7),
                hit(ModelKind::Beit3, 2, "v2/001.jpg", 0.6),
            ],
        );
        per_model
    }

    #[test]
    fn score_fusion_keeps_highest_model_per_path() {
        let fused = fuse_by_score(&two_models(), 10);
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].path, "v1/001.jpg");
        assert_eq!(fused[0].model, ModelKind::Clip);
        assert!((fused[0].score - 0.9).abs() < 1e-6);
        // No duplicate paths survive.
        let mut paths: Vec<&str> = fused.iter().map(|h| h.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn score_fusion_truncates() {
        let fused = fuse_by_score(&two_models(), 2);
        assert_eq!(fused.len(), 2);
        assert!(fused[0].score >= fused[1].score);
    }

    #[test]
    fn rrf_rewards_agreement() {
        let fused = fuse_by_reciprocal_rank(&two_models(), 10);
        // v1/001.jpg appears at rank 0 in both lists and must lead.
        assert_eq!(fused[0].path, "v1/001.jpg");
        let expected = 2.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn borda_counts_positions() {
        let fused = fuse_by_borda(&two_models(), 10);
        // v1/001.jpg: 2 points from each list = 4.
        assert_eq!(fused[0].path, "v1/001.jpg");
        assert!((fused[0].score - 4.0).abs() < 1e-6);
    }

    #[test]
    fn weighted_fusion_respects_priorities() {
        let mut priorities = BTreeMap::new();
        priorities.insert(ModelKind::Clip, 3.0);
        priorities.insert(ModelKind::Beit3, 1.0);
        let fused = fuse_by_weighted_score(&two_models(), &priorities, 10);
        assert_eq!(fused[0].path, "v1/001.jpg");
        // 0.9 * 3/4 + 0.7 * 1/4
        assert!((fused[0].score - (0.9 * 0.75 + 0.7 * 0.25)).abs() < 1e-6);
    }

    #[test]
    fn rank_fusion_uses_mean_rank() {
        let fused = fuse_by_rank(&two_models(), 10);
        assert_eq!(fused[0].path, "v1/001.jpg");
        // Mean rank 1 -> 1 / (1 + 1).
        assert!((fused[0].score - 0.5).abs() < 1e-6);
    }
}
