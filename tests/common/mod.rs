//! Shared fixtures: a synthetic keyframe corpus with controllable
//! similarities, plus a deterministic stub encoder standing in for the ONNX
//! models.
#![allow(dead_code)]

use std::collections::BTreeMap;

use framesearch_core::config::ScoreFloors;
use framesearch_core::encode::{EncoderRegistry, QueryEncoder};
use framesearch_core::error::Result;
use framesearch_core::{
    Engine, EngineParts, FeatureStore, FlatIpIndex, IdAssetMap, IdentityTranslator, ModelKind,
    TemporalOptions,
};
use image::RgbImage;
use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use tempfile::TempDir;

pub const DIM: usize = 8;

/// Unit vector along `axis`.
pub fn axis(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

/// Normalized blend of weighted axes, e.g. `blend(&[(0, 1.0), (1, 0.5)])`.
pub fn blend(parts: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for &(axis, weight) in parts {
        v[axis] += weight;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Deterministic encoder: exact phrase lookups first, then a hash-derived
/// axis so unknown text still encodes reproducibly. Images map to the axis
/// named by the top-left red channel.
pub struct StubEncoder {
    model: ModelKind,
    phrases: BTreeMap<String, Vec<f32>>,
}

impl StubEncoder {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            phrases: BTreeMap::new(),
        }
    }

    pub fn phrase(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.phrases.insert(text.to_string(), vector);
        self
    }
}

impl QueryEncoder for StubEncoder {
    fn model(&self) -> ModelKind {
        self.model
    }

    fn dim(&self) -> u32 {
        DIM as u32
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.phrases.get(text) {
            return Ok(vector.clone());
        }
        let hash: u64 = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325, |acc: u64, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
            });
        Ok(axis((hash % DIM as u64) as usize))
    }

    fn encode_image(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let red = image.get_pixel(0, 0).0[0] as usize;
        Ok(axis(red % DIM))
    }
}

/// Builds a corpus where keyframe embeddings double as per-video feature
/// rows, keeping every startup invariant satisfied by construction.
pub struct WorldBuilder {
    paths: Vec<String>,
    models: BTreeMap<ModelKind, Vec<Vec<f32>>>,
    encoders: EncoderRegistry,
    floors: ScoreFloors,
    temporal: TemporalOptions,
    priorities: BTreeMap<ModelKind, f32>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            models: BTreeMap::new(),
            encoders: EncoderRegistry::new(),
            floors: ScoreFloors::default(),
            temporal: TemporalOptions::default(),
            priorities: BTreeMap::new(),
        }
    }

    /// Append a video: `frames` embeddings become both index rows and the
    /// video's feature matrix, under every registered model.
    pub fn video(mut self, video_id: &str, frames: Vec<Vec<f32>>) -> Self {
        let batch = video_id.split('_').next().unwrap_or(video_id);
        for (i, frame) in frames.iter().enumerate() {
            self.paths.push(format!(
                "kf/Keyframes_{batch}/keyframes/{video_id}/{:03}.jpg",
                i + 1
            ));
            for rows in self.models.values_mut() {
                rows.push(frame.clone());
            }
        }
        self
    }

    /// Register a model before adding videos.
    pub fn model(mut self, encoder: StubEncoder) -> Self {
        assert!(
            self.paths.is_empty(),
            "register models before adding videos"
        );
        self.models.insert(encoder.model(), Vec::new());
        self.encoders.register(Box::new(encoder));
        self
    }

    pub fn floor(mut self, model: ModelKind, floor: f32) -> Self {
        self.floors.set(model, floor);
        self
    }

    pub fn priority(mut self, model: ModelKind, weight: f32) -> Self {
        self.priorities.insert(model, weight);
        self
    }

    pub fn build(self) -> (TempDir, Engine) {
        let dir = TempDir::new().expect("tempdir");
        let assets = IdAssetMap::from_paths(self.paths).expect("asset map");

        // One feature file per (model, video), rows in frame order.
        for (&model, rows) in &self.models {
            let mut grouped: Vec<(String, Vec<Vec<f32>>)> = Vec::new();
            for video in assets.videos() {
                let ids = assets.ids_of_video(video);
                let matrix_rows: Vec<Vec<f32>> =
                    ids.iter().map(|&id| rows[id as usize].clone()).collect();
                grouped.push((video.to_string(), matrix_rows));
            }
            for (video, matrix_rows) in grouped {
                let feature_dir = dir
                    .path()
                    .join(format!("features-{model}"))
                    .join("features");
                std::fs::create_dir_all(&feature_dir).expect("mkdir");
                let flat: Vec<f32> = matrix_rows.iter().flatten().copied().collect();
                let matrix =
                    Array2::from_shape_vec((matrix_rows.len(), DIM), flat).expect("matrix");
                let file = std::fs::File::create(feature_dir.join(format!("{video}.npy")))
                    .expect("feature file");
                matrix.write_npy(file).expect("write npy");
            }
        }

        let indexes: BTreeMap<ModelKind, FlatIpIndex> = self
            .models
            .into_iter()
            .map(|(model, rows)| {
                let index = FlatIpIndex::from_rows(DIM as u32, rows).expect("index");
                (model, index)
            })
            .collect();

        let engine = Engine::from_parts(EngineParts {
            indexes,
            assets,
            features: FeatureStore::new(dir.path()),
            encoders: self.encoders,
            translator: Box::new(IdentityTranslator),
            floors: self.floors,
            temporal: self.temporal,
            priorities: self.priorities,
        })
        .expect("engine");
        (dir, engine)
    }
}

/// Standard three-video world used by the temporal scenarios:
///   L01_V001 - 6 frames, story axes at rows 0/2/4 with filler between
///   L01_V002 - 4 frames, story axes at rows 0/1/2 plus a fourth step
///   L02_V001 - 2 frames, matches the first sentence but too short to align
pub fn story_world() -> (TempDir, Engine) {
    let encoder = StubEncoder::new(ModelKind::Clip)
        .phrase("a person walks in", axis(0))
        .phrase("they sit down", axis(1))
        .phrase("they leave the room", axis(2))
        .phrase("the lights go out", axis(3));
    WorldBuilder::new()
        .model(encoder)
        .floor(ModelKind::Clip, 0.2)
        .video(
            "L01_V001",
            vec![axis(0), axis(5), axis(1), axis(5), axis(2), axis(5)],
        )
        .video("L01_V002", vec![axis(0), axis(1), axis(2), axis(3)])
        .video("L02_V001", vec![axis(0), axis(6)])
        .build()
}
