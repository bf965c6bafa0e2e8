//! Engine configuration.
//!
//! Everything here is resolved by the embedding application and handed to the
//! engine once at startup; the core performs no environment or path
//! discovery of its own.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_BEIT3_FLOOR, DEFAULT_CACHE_BUDGET_FLOATS, DEFAULT_CLIP_FLOOR, DEFAULT_SHIFTED_FLOOR,
};
use crate::types::{ModelKind, TemporalOptions};

/// Per-model file locations. `text_model`, `vision_model`, and `tokenizer`
/// are only consulted when constructing ONNX encoders.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelPaths {
    /// Flat index artifact for this embedding space.
    pub index_file: PathBuf,
    /// Embedding dimension the index must declare.
    pub dim: u32,
    #[serde(default)]
    pub text_model: Option<PathBuf>,
    #[serde(default)]
    pub vision_model: Option<PathBuf>,
    #[serde(default)]
    pub tokenizer: Option<PathBuf>,
}

/// Score floors per embedding space. Hits below the floor are dropped
/// silently; the floor is a tuning knob, not a semantic invariant.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ScoreFloors {
    overrides: BTreeMap<ModelKind, f32>,
}

impl ScoreFloors {
    /// Floor for a model: an explicit override, or the stock default.
    /// LongCLIP and CLIP2Video embeddings shift their score range upward,
    /// hence the higher stock cut.
    #[must_use]
    pub fn floor(&self, model: ModelKind) -> f32 {
        if let Some(&floor) = self.overrides.get(&model) {
            return floor;
        }
        match model {
            ModelKind::Clip => DEFAULT_CLIP_FLOOR,
            ModelKind::Beit3 => DEFAULT_BEIT3_FLOOR,
            ModelKind::LongClip | ModelKind::Clip2Video => DEFAULT_SHIFTED_FLOOR,
        }
    }

    pub fn set(&mut self, model: ModelKind, floor: f32) {
        self.overrides.insert(model, floor);
    }
}

/// Full engine configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// JSON file mapping keyframe ids to asset paths.
    pub asset_map_file: PathBuf,
    /// Root of the per-video feature trees (`features-<model>/features/`).
    pub features_root: PathBuf,
    /// Embedding spaces to load, with their artifacts.
    pub models: BTreeMap<ModelKind, ModelPaths>,
    #[serde(default)]
    pub score_floors: ScoreFloors,
    #[serde(default)]
    pub temporal: TemporalOptions,
    /// Feature-cache budget in f32 entries.
    #[serde(default = "default_cache_budget")]
    pub cache_budget_floats: usize,
    /// Relative weights for weighted fusion; missing models weigh 1.
    #[serde(default)]
    pub model_priorities: BTreeMap<ModelKind, f32>,
}

fn default_cache_budget() -> usize {
    DEFAULT_CACHE_BUDGET_FLOATS
}
