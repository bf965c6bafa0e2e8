//! Temporal alignment of multi-sentence queries.
//!
//! A query is read as an ordered story, one sentence per step. Each sentence
//! retrieves a shortlist from the model's index; the videos surfacing there
//! become alignment candidates. For every candidate the engine builds one
//! similarity row per sentence over the video's keyframes, normalizes each
//! row to `[0, 1]`, bumps frames near strong per-sentence hits, and runs a
//! gap-constrained dynamic program to find the best monotonically ordered
//! frame sequence. Candidates are scored independently and in parallel;
//! per-video failures drop the video, never the request.

use std::collections::{HashSet, VecDeque};

use ndarray::ArrayView1;
use rayon::prelude::*;

use crate::constants::{BACKPTR_NONE, MINMAX_EPSILON, SHORTLIST_PREVIEW_LEN};
use crate::encode::is_zero;
use crate::error::Result;
use crate::types::asset;
use crate::types::{
    ModelKind, RankedUnit, SentenceShortlist, TemporalHit, TemporalOptions, TemporalResponse,
};

use super::cancel::CancelToken;
use super::Engine;

impl Engine {
    /// Temporal search with the engine's configured defaults and no
    /// cancellation deadline.
    pub fn temporal_search(
        &self,
        model: ModelKind,
        query: &str,
        k: usize,
    ) -> Result<TemporalResponse> {
        let options = self.temporal_defaults().clone();
        self.temporal_search_with(model, query, k, &options, &CancelToken::new())
    }

    /// Temporal search with explicit tunables and a cancellation token.
    pub fn temporal_search_with(
        &self,
        model: ModelKind,
        query: &str,
        k: usize,
        options: &TemporalOptions,
        cancel: &CancelToken,
    ) -> Result<TemporalResponse> {
        // Aligned frames must be strictly increasing.
        let mut options = options.clone();
        options.w_min = options.w_min.max(1);

        let translated = self.translator().translate(query)?;
        let sentences = split_query_sentences(&translated);
        tracing::debug!(model = %model, sentences = sentences.len(), k, "temporal search");

        if sentences.is_empty() {
            return Ok(TemporalResponse {
                sentences,
                per_sentence: Vec::new(),
                candidate_videos: Vec::new(),
                results: Vec::new(),
            });
        }
        if sentences.len() == 1 {
            return self.single_sentence_fallback(model, sentences, k);
        }

        // Per-sentence retrieval.
        let encoder = self.encoders().get(model)?;
        let index = self.index_of(model)?;
        let mut queries: Vec<Vec<f32>> = Vec::with_capacity(sentences.len());
        let mut shortlists: Vec<Vec<RankedUnit>> = Vec::with_capacity(sentences.len());
        for sentence in &sentences {
            let vector = encoder.encode_text(sentence)?;
            let units = if is_zero(&vector) {
                Vec::new()
            } else {
                let (scores, ids) = index.search(&vector, options.top_k_per_sentence)?;
                self.ranked_units(&scores, &ids)
            };
            queries.push(vector);
            shortlists.push(units);
        }
        cancel.check()?;

        // Candidate set: scan sentences in order, hits in rank order,
        // first-seen videos win until the cap.
        let mut candidate_videos: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        'scan: for units in &shortlists {
            for unit in units {
                if candidate_videos.len() >= options.max_candidate_videos {
                    break 'scan;
                }
                if seen.insert(unit.video_id.as_str()) {
                    candidate_videos.push(unit.video_id.clone());
                }
            }
        }
        tracing::debug!(candidates = candidate_videos.len(), "candidate videos selected");

        let results = if candidate_videos.is_empty() {
            Vec::new()
        } else {
            let scored: Vec<Option<(TemporalHit, f32)>> = candidate_videos
                .par_iter()
                .map(|video_id| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    self.score_video(model, video_id, &queries, &shortlists, &options)
                })
                .collect();
            cancel.check()?;

            let mut results: Vec<(TemporalHit, f32)> = scored.into_iter().flatten().collect();
            // Scaled score orders the same as raw; video id settles exact ties.
            results.sort_by(|a, b| {
                b.1.total_cmp(&a.1)
                    .then_with(|| a.0.video_id.cmp(&b.0.video_id))
            });
            results.truncate(k);
            results.into_iter().map(|(hit, _)| hit).collect()
        };

        Ok(TemporalResponse {
            per_sentence: preview_shortlists(&sentences, shortlists),
            sentences,
            candidate_videos,
            results,
        })
    }

    /// A one-sentence query has nothing to align; collapse a plain text
    /// search to one hit per distinct video in first-occurrence order.
    fn single_sentence_fallback(
        &self,
        model: ModelKind,
        sentences: Vec<String>,
        k: usize,
    ) -> Result<TemporalResponse> {
        let hits = self.text_search(model, &sentences[0], k)?;

        let mut candidate_videos: Vec<String> = Vec::new();
        let mut results: Vec<TemporalHit> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut units: Vec<RankedUnit> = Vec::new();
        for hit in &hits {
            let Some(video_id) = asset::video_id_of(&hit.path) else {
                continue;
            };
            units.push(RankedUnit {
                video_id: video_id.to_string(),
                path: hit.path.clone(),
                id: hit.id,
                score: hit.score,
            });
            if seen.insert(video_id.to_string()) {
                candidate_videos.push(video_id.to_string());
                if results.len() < k {
                    results.push(TemporalHit {
                        video_id: video_id.to_string(),
                        frames: Vec::new(),
                        images: Vec::new(),
                        paths: vec![hit.path.clone()],
                        score: hit.score,
                    });
                }
            }
        }

        Ok(TemporalResponse {
            per_sentence: preview_shortlists(&sentences, vec![units]),
            sentences,
            candidate_videos,
            results,
        })
    }

    fn ranked_units(&self, scores: &[f32], ids: &[u64]) -> Vec<RankedUnit> {
        scores
            .iter()
            .zip(ids)
            .filter(|&(_, &id)| id != crate::constants::SENTINEL_ID)
            .filter_map(|(&score, &id)| {
                let path = self.assets().path_of(id)?;
                let video_id = asset::video_id_of(path)?;
                Some(RankedUnit {
                    video_id: video_id.to_string(),
                    path: path.to_string(),
                    id,
                    score,
                })
            })
            .collect()
    }

    /// Score one candidate video. `None` drops the video silently: missing
    /// or unreadable features, fewer frames than sentences, or no feasible
    /// alignment under the gap constraints.
    fn score_video(
        &self,
        model: ModelKind,
        video_id: &str,
        queries: &[Vec<f32>],
        shortlists: &[Vec<RankedUnit>],
        options: &TemporalOptions,
    ) -> Option<(TemporalHit, f32)> {
        let matrix = match self.features().load(model, video_id) {
            Ok(matrix) => matrix,
            Err(err) => {
                tracing::debug!(video = video_id, code = err.code(), "skipping candidate");
                return None;
            }
        };
        let frames_available = matrix.nrows();
        let m = queries.len();
        if frames_available < m {
            tracing::debug!(
                video = video_id,
                frames = frames_available,
                sentences = m,
                "too short to align"
            );
            return None;
        }
        if matrix.ncols() != queries[0].len() {
            tracing::warn!(
                video = video_id,
                matrix_dim = matrix.ncols(),
                query_dim = queries[0].len(),
                "feature dimension mismatch, skipping candidate"
            );
            return None;
        }

        // One weight row per sentence over the video's frames.
        let mut weights: Vec<Vec<f32>> = Vec::with_capacity(m);
        for (query, units) in queries.iter().zip(shortlists) {
            let query = ArrayView1::from(query.as_slice());
            // Cosine in [-1, 1] shifted into [0, 1] before normalization,
            // matching the original scoring.
            let mut row: Vec<f32> = matrix
                .dot(&query)
                .iter()
                .map(|&sim| sim * 0.5 + 0.5)
                .collect();
            min_max_normalize(&mut row);
            apply_anchor_bonuses(&mut row, units, video_id, options);
            weights.push(row);
        }

        let outcome = align_sequence(&weights, options.w_min, options.w_max)?;

        let ids = self.assets().ids_of_video(video_id);
        let paths: Vec<String> = outcome
            .frames
            .iter()
            .map(|&row| {
                ids.get(row)
                    .and_then(|&id| self.assets().path_of(id))
                    .map_or_else(|| asset::keyframe_path(video_id, row), String::from)
            })
            .collect();
        let images: Vec<String> = outcome.frames.iter().map(|&r| asset::frame_file_name(r)).collect();

        let score = outcome.raw * (100.0 / m as f32);
        Some((
            TemporalHit {
                video_id: video_id.to_string(),
                frames: outcome.frames,
                images,
                paths,
                score,
            },
            outcome.raw,
        ))
    }
}

/// Split a translated query into alignment sentences: split on `.`, trim,
/// drop empties.
#[must_use]
pub(crate) fn split_query_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Min-max normalize into `[0, 1]`; a near-constant row collapses to zeros.
pub(crate) fn min_max_normalize(row: &mut [f32]) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for &x in row.iter() {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    if !lo.is_finite() || !hi.is_finite() || hi - lo < MINMAX_EPSILON {
        row.fill(0.0);
        return;
    }
    let span = hi - lo;
    for x in row {
        *x = (*x - lo) / span;
    }
}

/// Add triangular bonuses around this video's strongest per-sentence hits.
/// The anchor row comes from the zero-padded frame number in the hit's path;
/// unparseable paths are skipped.
pub(crate) fn apply_anchor_bonuses(
    row: &mut [f32],
    units: &[RankedUnit],
    video_id: &str,
    options: &TemporalOptions,
) {
    let frames = row.len();
    let mut bonus = vec![0.0f32; frames];
    let anchors = units
        .iter()
        .filter(|u| u.video_id == video_id)
        .take(options.anchor_top);
    for unit in anchors {
        let Some(frame_no) = asset::frame_no_of(&unit.path) else {
            continue;
        };
        if frame_no == 0 {
            continue;
        }
        let center = (frame_no - 1) as usize;
        if center >= frames {
            continue;
        }
        let lo = center.saturating_sub(options.anchor_window);
        let hi = (center + options.anchor_window + 1).min(frames);
        for t in lo..hi {
            let distance = t.abs_diff(center) as f32;
            let decay = 1.0 - distance / (options.anchor_window as f32 + 1.0);
            // Overlapping anchors keep their strongest bump, they don't stack.
            bonus[t] = bonus[t].max(options.anchor_boost * decay);
        }
    }
    for (w, b) in row.iter_mut().zip(bonus) {
        *w += b;
    }
}

pub(crate) struct AlignmentOutcome {
    pub frames: Vec<usize>,
    pub raw: f32,
}

/// Gap-constrained alignment by backward dynamic programming.
///
/// `weights[t][j]` is the reward for placing sentence `t` at frame `j`; the
/// chosen frames must advance by `w_min..=w_max` per step. Returns the
/// highest-reward feasible sequence, ties resolving to the earliest frames.
pub(crate) fn align_sequence(
    weights: &[Vec<f32>],
    w_min: usize,
    w_max: Option<usize>,
) -> Option<AlignmentOutcome> {
    let m = weights.len();
    let frames = weights.first()?.len();
    if frames == 0 {
        return None;
    }

    // score_next holds layer t+1 scores while computing layer t.
    let mut score_next: Vec<f32> = weights[m - 1].clone();
    let mut backptrs: Vec<Vec<usize>> = Vec::with_capacity(m.saturating_sub(1));
    for t in (0..m - 1).rev() {
        let (best, ptr) = best_successors(&score_next, w_min, w_max);
        let mut score_t = vec![f32::NEG_INFINITY; frames];
        for j in 0..frames {
            if ptr[j] != BACKPTR_NONE {
                score_t[j] = weights[t][j] + best[j];
            }
        }
        backptrs.push(ptr);
        score_next = score_t;
    }
    backptrs.reverse();

    let mut start = 0;
    let mut raw = f32::NEG_INFINITY;
    for (j, &s) in score_next.iter().enumerate() {
        if s > raw {
            raw = s;
            start = j;
        }
    }
    if !raw.is_finite() {
        return None;
    }

    let mut frames_out = Vec::with_capacity(m);
    frames_out.push(start);
    let mut cursor = start;
    for table in &backptrs {
        let next = table[cursor];
        if next == BACKPTR_NONE {
            return None;
        }
        frames_out.push(next);
        cursor = next;
    }
    Some(AlignmentOutcome {
        frames: frames_out,
        raw,
    })
}

/// For each frame `j`, the best successor score and index over the window
/// `[j + w_min, j + w_max]`. Ties prefer the smaller successor index.
fn best_successors(
    score_next: &[f32],
    w_min: usize,
    w_max: Option<usize>,
) -> (Vec<f32>, Vec<usize>) {
    let frames = score_next.len();
    let mut best = vec![f32::NEG_INFINITY; frames];
    let mut ptr = vec![BACKPTR_NONE; frames];

    match w_max {
        None => {
            // Unbounded gap: suffix maximum, leftmost winner on ties.
            let mut suffix_val = f32::NEG_INFINITY;
            let mut suffix_idx = BACKPTR_NONE;
            let mut suffix: Vec<(f32, usize)> = vec![(suffix_val, suffix_idx); frames + 1];
            for j in (0..frames).rev() {
                if score_next[j] >= suffix_val {
                    suffix_val = score_next[j];
                    suffix_idx = j;
                }
                suffix[j] = (suffix_val, suffix_idx);
            }
            for j in 0..frames {
                let lo = j + w_min;
                if lo < frames {
                    let (val, idx) = suffix[lo];
                    best[j] = val;
                    ptr[j] = idx;
                }
            }
        }
        Some(w_max) => {
            // Bounded gap: sliding-window maximum over a monotonic deque.
            // Indices enter at the left edge as j decreases and leave at the
            // right; values increase front to back, so the max sits at the
            // back and equal values already resolved to the smaller index.
            let mut deque: VecDeque<usize> = VecDeque::new();
            for j in (0..frames).rev() {
                let lo = j + w_min;
                let hi = j.saturating_add(w_max);
                if lo < frames {
                    while let Some(&front) = deque.front() {
                        if score_next[front] <= score_next[lo] {
                            deque.pop_front();
                        } else {
                            break;
                        }
                    }
                    deque.push_front(lo);
                }
                while let Some(&back) = deque.back() {
                    if back > hi {
                        deque.pop_back();
                    } else {
                        break;
                    }
                }
                if let Some(&back) = deque.back() {
                    best[j] = score_next[back];
                    ptr[j] = back;
                }
            }
        }
    }
    (best, ptr)
}

fn preview_shortlists(
    sentences: &[String],
    shortlists: Vec<Vec<RankedUnit>>,
) -> Vec<SentenceShortlist> {
    sentences
        .iter()
        .zip(shortlists)
        .map(|(sentence, mut units)| {
            units.truncate(SHORTLIST_PREVIEW_LEN);
            SentenceShortlist {
                sentence: sentence.clone(),
                units,
            }
        })
        .collect()
}
