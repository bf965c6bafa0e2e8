//! Multi-model fusion scenarios.

mod common;

use common::{StubEncoder, WorldBuilder, axis, blend};
use framesearch_core::{FusionMethod, ModelKind, ModelSelect};

/// Two embedding spaces over the same corpus. CLIP leans on axis 0, BEiT-3
/// on axis 1, and both see the shared frame on axis 2.
fn fusion_world() -> (tempfile::TempDir, framesearch_core::Engine) {
    let clip = StubEncoder::new(ModelKind::Clip)
        .phrase("festival parade", blend(&[(0, 1.0), (2, 0.8)]))
        .phrase("clip only", axis(0));
    let beit3 = StubEncoder::new(ModelKind::Beit3)
        .phrase("festival parade", blend(&[(1, 1.0), (2, 0.6)]))
        .phrase("clip only", axis(7));
    WorldBuilder::new()
        .model(clip)
        .model(beit3)
        .floor(ModelKind::Clip, 0.2)
        .floor(ModelKind::Beit3, 0.4)
        .video("L01_V001", vec![axis(0), axis(1), axis(2)])
        .video("L01_V002", vec![axis(3), axis(4), axis(5)])
        .build()
}

#[test]
fn fused_list_is_bounded_deduped_and_multi_model() {
    let (_dir, engine) = fusion_world();
    let hits = engine
        .multi_text_search("festival parade", 10)
        .expect("fused search");

    assert!(hits.len() <= 10);
    let mut paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
    paths.sort_unstable();
    let before = paths.len();
    paths.dedup();
    assert_eq!(paths.len(), before, "duplicate asset path survived fusion");

    let models: std::collections::BTreeSet<ModelKind> =
        hits.iter().map(|h| h.model).collect();
    assert!(models.len() >= 2, "expected hits from at least two models");
}

#[test]
fn highest_scoring_model_wins_shared_paths() {
    let (_dir, engine) = fusion_world();
    let hits = engine
        .multi_text_search("festival parade", 10)
        .expect("fused search");

    // Both models score the axis-2 frame; CLIP's 0.8 component beats
    // BEiT-3's 0.6 after normalization.
    let shared = hits
        .iter()
        .find(|h| h.path.ends_with("L01_V001/003.jpg"))
        .expect("shared frame fused in");
    assert_eq!(shared.model, ModelKind::Clip);
}

#[test]
fn model_select_dispatches_one_or_all() {
    let (_dir, engine) = fusion_world();

    let single = engine
        .text_search_select(ModelSelect::One(ModelKind::Clip), "festival parade", 10)
        .expect("single");
    assert!(single.iter().all(|h| h.model == ModelKind::Clip));

    let fused = engine
        .text_search_select(ModelSelect::All, "festival parade", 10)
        .expect("all");
    assert!(fused.len() >= single.len());
}

#[test]
fn fusion_survives_a_model_with_no_matches() {
    let (_dir, engine) = fusion_world();
    // "clip only" encodes to axis 7 under BEiT-3, which no frame occupies;
    // that model contributes nothing but the fused request still succeeds.
    let hits = engine.multi_text_search("clip only", 10).expect("fused");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.model == ModelKind::Clip));
}

#[test]
fn multi_neighbor_search_works_without_encoders() {
    let (_dir, engine) = fusion_world();
    let hits = engine.multi_neighbor_search(2, 5).expect("neighbors");
    assert_eq!(hits[0].id, 2);
    assert!(hits[0].score >= 1.0 - 1e-4);
}

#[test]
fn alternative_fusion_methods_dedup_and_rank() {
    let (_dir, engine) = fusion_world();
    let per_model: std::collections::BTreeMap<ModelKind, Vec<framesearch_core::Hit>> =
        [ModelKind::Clip, ModelKind::Beit3]
            .into_iter()
            .map(|m| {
                let hits = engine.text_search(m, "festival parade", 10).expect("search");
                (m, hits)
            })
            .collect();

    for method in [
        FusionMethod::Score,
        FusionMethod::Rank,
        FusionMethod::ReciprocalRank,
        FusionMethod::Weighted,
        FusionMethod::Borda,
    ] {
        let fused = engine.fuse_with_method(&per_model, method, 10);
        let mut paths: Vec<&str> = fused.iter().map(|h| h.path.as_str()).collect();
        paths.sort_unstable();
        let before = paths.len();
        paths.dedup();
        assert_eq!(paths.len(), before, "{method:?} produced duplicates");
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score, "{method:?} not sorted");
        }
    }
}

#[test]
fn fusion_k_zero_is_empty() {
    let (_dir, engine) = fusion_world();
    let hits = engine
        .multi_text_search("festival parade", 0)
        .expect("fused");
    assert!(hits.is_empty());
}
