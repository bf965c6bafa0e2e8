//! Shared defaults and numeric tolerances.
//!
//! Temporal tunables mirror the contract defaults; every one of them is also a
//! configuration knob on [`crate::TemporalOptions`].

use std::time::Duration;

/// Per-sentence shortlist size during temporal retrieval.
pub const DEFAULT_TOP_K_PER_SENTENCE: usize = 200;

/// Maximum distinct videos admitted to temporal alignment.
pub const DEFAULT_MAX_CANDIDATE_VIDEOS: usize = 30;

/// Minimum frame gap between consecutive sentences in an aligned sequence.
pub const DEFAULT_W_MIN: usize = 1;

/// Anchor hits considered per sentence per video.
pub const DEFAULT_ANCHOR_TOP: usize = 5;

/// Half-width of the triangular anchor window, in frames.
pub const DEFAULT_ANCHOR_WINDOW: usize = 2;

/// Peak additive bonus at an anchor frame.
pub const DEFAULT_ANCHOR_BOOST: f32 = 0.10;

/// Ranked units kept per sentence in the temporal response metadata.
pub const SHORTLIST_PREVIEW_LEN: usize = 20;

/// Below this spread, a per-sentence similarity row normalizes to all zeros.
pub const MINMAX_EPSILON: f32 = 1e-6;

/// Accepted deviation from unit norm for query vectors.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Feature rows are re-normalized on load when their norm drifts further
/// than this from 1.
pub const ROW_NORM_DRIFT: f32 = 1e-5;

/// Default score floors per embedding space. LongCLIP and CLIP2Video scores
/// sit in a range shifted upward by the embedding, hence the higher cut.
pub const DEFAULT_CLIP_FLOOR: f32 = 0.20;
pub const DEFAULT_BEIT3_FLOOR: f32 = 0.40;
pub const DEFAULT_SHIFTED_FLOOR: f32 = 1.0;

/// Timeout for fetching probe images over HTTP.
pub const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default feature-cache budget in f32 entries; enough for roughly 32 videos
/// at 300 keyframes x 1024 dims.
pub const DEFAULT_CACHE_BUDGET_FLOATS: usize = 32 * 300 * 1024;

/// Pads index search results when fewer than `k` vectors exist.
pub const SENTINEL_ID: u64 = u64::MAX;

/// Marks an infeasible back-pointer in the alignment tables.
pub const BACKPTR_NONE: usize = usize::MAX;

/// Rough byte budget per text token used by the deterministic truncation.
pub const BYTES_PER_TOKEN: usize = 4;

/// Last-resort truncation length before giving up on tokenization.
pub const HARD_TRUNCATE_BYTES: usize = 50;

/// Rank offset for reciprocal-rank fusion.
pub const RRF_RANK_OFFSET: f32 = 60.0;
