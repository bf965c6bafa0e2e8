//! Engine-level retrieval scenarios: text, image, and neighbor search over a
//! synthetic corpus.

mod common;

use common::{StubEncoder, WorldBuilder, axis, blend};
use framesearch_core::{ImageSource, ModelKind};
use image::RgbImage;

fn search_world() -> (tempfile::TempDir, framesearch_core::Engine) {
    let encoder = StubEncoder::new(ModelKind::Clip)
        .phrase("a red car at night", blend(&[(0, 1.0), (1, 0.5)]))
        .phrase("degenerate", vec![0.0; common::DIM]);
    WorldBuilder::new()
        .model(encoder)
        .video("L01_V001", vec![axis(0), axis(1), axis(2)])
        .video("L01_V002", vec![axis(0), axis(3), axis(4)])
        .build()
}

#[test]
fn text_search_ranks_descending_within_k() {
    let (_dir, engine) = search_world();

    let hits = engine
        .text_search(ModelKind::Clip, "a red car at night", 3)
        .expect("search");

    assert!(hits.len() <= 3);
    assert!(!hits.is_empty());
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // Query leans hardest on axis 0; ids 0 and 3 both sit on it, the tie
    // resolves to the lower id.
    assert_eq!(hits[0].id, 0);
    assert!(hits.iter().all(|h| h.model == ModelKind::Clip));
}

#[test]
fn text_search_has_no_duplicate_paths() {
    let (_dir, engine) = search_world();
    let hits = engine
        .text_search(ModelKind::Clip, "a red car at night", 6)
        .expect("search");
    let mut paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
    paths.sort_unstable();
    let before = paths.len();
    paths.dedup();
    assert_eq!(paths.len(), before);
}

#[test]
fn text_search_applies_score_floor() {
    let (_dir, engine) = search_world();
    // Floor 0.2: the blend scores ~0.894 on axis 0 and ~0.447 on axis 1;
    // everything else scores 0 and must be dropped.
    let hits = engine
        .text_search(ModelKind::Clip, "a red car at night", 6)
        .expect("search");
    assert!(hits.iter().all(|h| h.score >= 0.2));
    assert_eq!(hits.len(), 3);
}

#[test]
fn text_search_k_zero_short_circuits() {
    let (_dir, engine) = search_world();
    let hits = engine
        .text_search(ModelKind::Clip, "anything at all", 0)
        .expect("search");
    assert!(hits.is_empty());
}

#[test]
fn text_search_is_deterministic() {
    let (_dir, engine) = search_world();
    let first = engine
        .text_search(ModelKind::Clip, "a red car at night", 5)
        .expect("search");
    let second = engine
        .text_search(ModelKind::Clip, "a red car at night", 5)
        .expect("search");
    let key = |hits: &[framesearch_core::Hit]| {
        hits.iter()
            .map(|h| (h.id, h.path.clone(), h.score.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&first), key(&second));
}

#[test]
fn degenerate_zero_vector_yields_empty_list() {
    let (_dir, engine) = search_world();
    let hits = engine
        .text_search(ModelKind::Clip, "degenerate", 5)
        .expect("search");
    assert!(hits.is_empty());
}

#[test]
fn unregistered_model_is_unavailable_not_fallback() {
    let (_dir, engine) = search_world();
    let err = engine
        .text_search(ModelKind::Beit3, "a red car at night", 5)
        .expect_err("unavailable");
    assert_eq!(err.code(), "model_unavailable");
}

#[test]
fn image_search_uses_the_shared_loader() {
    let (_dir, engine) = search_world();
    // Stub encoder maps the top-left red channel to an axis: red 2 -> axis 2,
    // which only L01_V001 frame 3 occupies.
    let probe = RgbImage::from_pixel(4, 4, image::Rgb([2, 0, 0]));
    let hits = engine
        .image_search(ModelKind::Clip, &ImageSource::Decoded(probe), 4)
        .expect("search");
    assert_eq!(hits[0].id, 2);
    assert!(hits[0].path.ends_with("L01_V001/003.jpg"));
}

#[test]
fn neighbor_search_self_match_leads() {
    let (_dir, engine) = search_world();
    let hits = engine
        .neighbor_search(ModelKind::Clip, 4, 5)
        .expect("search");
    assert_eq!(hits[0].id, 4);
    assert!(hits[0].score >= 1.0 - 1e-4);
}

#[test]
fn neighbor_search_unknown_id_propagates() {
    let (_dir, engine) = search_world();
    let err = engine
        .neighbor_search(ModelKind::Clip, 999, 5)
        .expect_err("unknown");
    assert_eq!(err.code(), "unknown_id");
}

#[test]
fn startup_rejects_index_size_mismatch() {
    use framesearch_core::config::ScoreFloors;
    use framesearch_core::encode::EncoderRegistry;
    use framesearch_core::{
        Engine, EngineParts, FeatureStore, FlatIpIndex, IdAssetMap, IdentityTranslator,
        TemporalOptions,
    };

    let assets = IdAssetMap::from_paths(vec![
        "kf/Keyframes_L01/keyframes/L01_V001/001.jpg".to_string(),
        "kf/Keyframes_L01/keyframes/L01_V001/002.jpg".to_string(),
    ])
    .expect("assets");
    let index =
        FlatIpIndex::from_rows(common::DIM as u32, vec![axis(0)]).expect("one-row index");

    let err = Engine::from_parts(EngineParts {
        indexes: [(ModelKind::Clip, index)].into_iter().collect(),
        assets,
        features: FeatureStore::new("/nonexistent"),
        encoders: EncoderRegistry::new(),
        translator: Box::new(IdentityTranslator),
        floors: ScoreFloors::default(),
        temporal: TemporalOptions::default(),
        priorities: Default::default(),
    })
    .expect_err("size mismatch");
    assert_eq!(err.code(), "size_mismatch");
}
