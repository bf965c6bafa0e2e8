//! The engine handle: immutable after construction, shared by reference
//! across request workers.
//!
//! Construction wires the per-model indexes, the shared asset map, the
//! feature store, the encoder registry, and the translator together, and
//! enforces the startup invariants: every index holds exactly one vector per
//! asset-map entry, and every registered encoder agrees with its index on the
//! embedding dimension. A violated invariant refuses to serve rather than
//! degrade.

pub mod cancel;
mod fusion;
mod retrieval;
mod temporal;

use std::collections::BTreeMap;

use crate::config::{EngineConfig, ScoreFloors};
use crate::encode::EncoderRegistry;
use crate::error::{EngineError, Result};
use crate::features::FeatureStore;
use crate::index::{FlatIpIndex, IdAssetMap};
use crate::translate::Translate;
use crate::types::{ModelKind, TemporalOptions};

pub use cancel::CancelToken;

/// Read-only operational counters exposed by [`Engine::stats`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    /// Models with a loaded index.
    pub models: Vec<ModelKind>,
    /// Models with a registered encoder.
    pub encoders: Vec<ModelKind>,
    pub keyframes: u64,
    pub videos: usize,
    pub cached_feature_floats: usize,
}

/// Pieces the engine is assembled from. `Engine::open` fills these from an
/// [`EngineConfig`]; tests and embedders with custom loaders can assemble
/// them directly.
pub struct EngineParts {
    pub indexes: BTreeMap<ModelKind, FlatIpIndex>,
    pub assets: IdAssetMap,
    pub features: FeatureStore,
    pub encoders: EncoderRegistry,
    pub translator: Box<dyn Translate>,
    pub floors: ScoreFloors,
    pub temporal: TemporalOptions,
    pub priorities: BTreeMap<ModelKind, f32>,
}

/// Multi-modal keyframe retrieval engine.
pub struct Engine {
    indexes: BTreeMap<ModelKind, FlatIpIndex>,
    assets: IdAssetMap,
    features: FeatureStore,
    encoders: EncoderRegistry,
    translator: Box<dyn Translate>,
    floors: ScoreFloors,
    temporal: TemporalOptions,
    priorities: BTreeMap<ModelKind, f32>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("indexes", &self.indexes)
            .field("assets", &self.assets)
            .field("floors", &self.floors)
            .field("temporal", &self.temporal)
            .field("priorities", &self.priorities)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Load every configured index and assemble the engine.
    ///
    /// Encoders are supplied by the caller: ONNX-backed ones (behind the
    /// `onnx` feature), or custom implementations of
    /// [`crate::encode::QueryEncoder`].
    pub fn open(
        config: &EngineConfig,
        encoders: EncoderRegistry,
        translator: Box<dyn Translate>,
    ) -> Result<Self> {
        let assets = IdAssetMap::load(&config.asset_map_file)?;
        let mut indexes = BTreeMap::new();
        for (&model, paths) in &config.models {
            let index = FlatIpIndex::open(&paths.index_file, Some(paths.dim))?;
            indexes.insert(model, index);
        }
        Self::from_parts(EngineParts {
            indexes,
            assets,
            features: FeatureStore::with_budget(
                &config.features_root,
                config.cache_budget_floats,
            ),
            encoders,
            translator,
            floors: config.score_floors.clone(),
            temporal: config.temporal.clone(),
            priorities: config.model_priorities.clone(),
        })
    }

    /// Assemble from pre-built parts, enforcing the startup invariants.
    pub fn from_parts(parts: EngineParts) -> Result<Self> {
        let EngineParts {
            indexes,
            assets,
            features,
            encoders,
            translator,
            floors,
            temporal,
            priorities,
        } = parts;

        for (&model, index) in &indexes {
            if index.len() != assets.len() {
                return Err(EngineError::SizeMismatch {
                    reason: format!(
                        "{model} index holds {} vectors but the asset map has {} entries",
                        index.len(),
                        assets.len()
                    ),
                });
            }
            if encoders.contains(model) {
                let encoder = encoders.get(model)?;
                if encoder.dim() != index.dim() {
                    return Err(EngineError::DimMismatch {
                        model,
                        expected: encoder.dim(),
                        actual: index.dim(),
                    });
                }
            }
        }

        tracing::info!(
            models = ?indexes.keys().collect::<Vec<_>>(),
            keyframes = assets.len(),
            "engine ready"
        );
        Ok(Self {
            indexes,
            assets,
            features,
            encoders,
            translator,
            floors,
            temporal,
            priorities,
        })
    }

    /// Embedding spaces with a loaded index, in tag order.
    #[must_use]
    pub fn models(&self) -> Vec<ModelKind> {
        self.indexes.keys().copied().collect()
    }

    /// Operational snapshot for health endpoints.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            models: self.models(),
            encoders: self.encoders.models(),
            keyframes: self.assets.len(),
            videos: self.assets.videos().count(),
            cached_feature_floats: self.features.cached_floats(),
        }
    }

    #[must_use]
    pub fn assets(&self) -> &IdAssetMap {
        &self.assets
    }

    #[must_use]
    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    #[must_use]
    pub fn temporal_defaults(&self) -> &TemporalOptions {
        &self.temporal
    }

    pub(crate) fn index_of(&self, model: ModelKind) -> Result<&FlatIpIndex> {
        self.indexes
            .get(&model)
            .ok_or(EngineError::ModelUnavailable { model })
    }

    pub(crate) fn encoders(&self) -> &EncoderRegistry {
        &self.encoders
    }

    pub(crate) fn translator(&self) -> &dyn Translate {
        self.translator.as_ref()
    }

    pub(crate) fn floors(&self) -> &ScoreFloors {
        &self.floors
    }

    pub(crate) fn priorities(&self) -> &BTreeMap<ModelKind, f32> {
        &self.priorities
    }

    /// Models servable end to end: index loaded and encoder registered.
    pub(crate) fn servable_models(&self) -> Vec<ModelKind> {
        self.indexes
            .keys()
            .copied()
            .filter(|&m| self.encoders.contains(m))
            .collect()
    }
}

#[cfg(feature = "onnx")]
impl Engine {
    /// Convenience constructor: open the engine and build an ONNX encoder for
    /// every model whose configuration names weight and tokenizer files.
    pub fn open_with_onnx_encoders(
        config: &EngineConfig,
        translator: Box<dyn Translate>,
    ) -> Result<Self> {
        use crate::encode::onnx::OnnxEncoder;

        let mut encoders = EncoderRegistry::new();
        for (&model, paths) in &config.models {
            let (Some(text), Some(vision), Some(tokenizer)) = (
                paths.text_model.as_deref(),
                paths.vision_model.as_deref(),
                paths.tokenizer.as_deref(),
            ) else {
                tracing::info!(model = %model, "no encoder weights configured, index-only");
                continue;
            };
            encoders.register(Box::new(OnnxEncoder::load(model, text, vision, tokenizer)?));
        }
        Self::open(config, encoders, translator)
    }
}
