//! Public search request/response types exposed by the core library.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANCHOR_BOOST, DEFAULT_ANCHOR_TOP, DEFAULT_ANCHOR_WINDOW, DEFAULT_MAX_CANDIDATE_VIDEOS,
    DEFAULT_TOP_K_PER_SENTENCE, DEFAULT_W_MIN,
};

use super::common::{KeyframeId, ModelKind};

/// A single ranked keyframe hit.
///
/// `score` is the inner product from the matching index, in that model's
/// native range. `model` records which embedding space produced the hit; it is
/// carried for observability and plays no part in ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub score: f32,
    pub id: KeyframeId,
    pub path: String,
    pub model: ModelKind,
}

/// Tunables for temporal alignment. Defaults follow the engine contract;
/// every field can be overridden per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalOptions {
    /// Shortlist size per sentence during the retrieval phase.
    #[serde(default = "default_top_k_per_sentence")]
    pub top_k_per_sentence: usize,
    /// Maximum distinct videos admitted to alignment.
    #[serde(default = "default_max_candidate_videos")]
    pub max_candidate_videos: usize,
    /// Minimum frame gap between consecutive sentences. Clamped to >= 1 so
    /// aligned frames are strictly increasing.
    #[serde(default = "default_w_min")]
    pub w_min: usize,
    /// Maximum frame gap; unbounded when unset.
    #[serde(default)]
    pub w_max: Option<usize>,
    /// Anchor hits considered per sentence per video.
    #[serde(default = "default_anchor_top")]
    pub anchor_top: usize,
    /// Half-width of the triangular anchor window, in frames.
    #[serde(default = "default_anchor_window")]
    pub anchor_window: usize,
    /// Peak additive bonus at an anchor frame.
    #[serde(default = "default_anchor_boost")]
    pub anchor_boost: f32,
}

fn default_top_k_per_sentence() -> usize {
    DEFAULT_TOP_K_PER_SENTENCE
}
fn default_max_candidate_videos() -> usize {
    DEFAULT_MAX_CANDIDATE_VIDEOS
}
fn default_w_min() -> usize {
    DEFAULT_W_MIN
}
fn default_anchor_top() -> usize {
    DEFAULT_ANCHOR_TOP
}
fn default_anchor_window() -> usize {
    DEFAULT_ANCHOR_WINDOW
}
fn default_anchor_boost() -> f32 {
    DEFAULT_ANCHOR_BOOST
}

impl Default for TemporalOptions {
    fn default() -> Self {
        Self {
            top_k_per_sentence: DEFAULT_TOP_K_PER_SENTENCE,
            max_candidate_videos: DEFAULT_MAX_CANDIDATE_VIDEOS,
            w_min: DEFAULT_W_MIN,
            w_max: None,
            anchor_top: DEFAULT_ANCHOR_TOP,
            anchor_window: DEFAULT_ANCHOR_WINDOW,
            anchor_boost: DEFAULT_ANCHOR_BOOST,
        }
    }
}

/// One entry of a per-sentence shortlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedUnit {
    pub video_id: String,
    pub path: String,
    pub id: KeyframeId,
    pub score: f32,
}

/// Per-sentence retrieval shortlist echoed back in the temporal response,
/// trimmed for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceShortlist {
    pub sentence: String,
    pub units: Vec<RankedUnit>,
}

/// One aligned video in a temporal response.
///
/// `frames` are 0-based row indices into the video's feature matrix, strictly
/// increasing, one per query sentence. `images` are the matching keyframe file
/// names and `paths` the full asset paths. In the single-sentence fallback all
/// three carry the one matching keyframe of the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalHit {
    pub video_id: String,
    pub frames: Vec<usize>,
    pub images: Vec<String>,
    pub paths: Vec<String>,
    pub score: f32,
}

/// Full temporal search response. `sentences` and `candidate_videos` are
/// populated even when no video yields an aligned sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalResponse {
    pub sentences: Vec<String>,
    pub per_sentence: Vec<SentenceShortlist>,
    pub candidate_videos: Vec<String>,
    pub results: Vec<TemporalHit>,
}

/// Strategy for merging ranked lists from several embedding spaces.
///
/// `Score` is the default engine behavior: raw scores compete directly and the
/// highest-scoring model wins each path. The remaining strategies are
/// rank-based alternatives selectable through
/// [`crate::Engine::fuse_with_method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    #[default]
    Score,
    Rank,
    ReciprocalRank,
    Weighted,
    Borda,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_defaults_match_contract() {
        let opts = TemporalOptions::default();
        assert_eq!(opts.top_k_per_sentence, 200);
        assert_eq!(opts.max_candidate_videos, 30);
        assert_eq!(opts.w_min, 1);
        assert_eq!(opts.w_max, None);
        assert_eq!(opts.anchor_top, 5);
        assert_eq!(opts.anchor_window, 2);
        assert!((opts.anchor_boost - 0.10).abs() < f32::EPSILON);
    }

    #[test]
    fn temporal_options_deserialize_with_defaults() {
        let opts: TemporalOptions = serde_json::from_str(r#"{"w_max": 5}"#).expect("parse");
        assert_eq!(opts.w_max, Some(5));
        assert_eq!(opts.top_k_per_sentence, 200);
    }
}
