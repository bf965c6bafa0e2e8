//! Query encoding: text and image probes to unit-norm vectors in a model's
//! embedding space.
//!
//! Each embedding space registers one [`QueryEncoder`]; requests for an
//! unregistered model fail with `ModelUnavailable`, never with a silent
//! fallback to a different space. The ONNX-backed encoders live in
//! [`onnx`] behind the `onnx` cargo feature; the trait and the shared
//! text/image plumbing are unconditional.

pub mod image_load;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;
pub mod truncate;

use std::collections::BTreeMap;

use image::RgbImage;

use crate::error::{EngineError, Result};
use crate::types::ModelKind;

/// Static description of an embedding space: dimension, token budget, and
/// image preprocessing constants.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub dim: u32,
    /// Token window for text; `None` means the encoder handles arbitrary
    /// length itself.
    pub max_text_tokens: Option<usize>,
    /// Square input edge in pixels.
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

pub static MODEL_SPECS: [ModelSpec; 4] = [
    ModelSpec {
        kind: ModelKind::Clip,
        dim: 512,
        max_text_tokens: Some(77),
        image_size: 224,
        mean: CLIP_MEAN,
        std: CLIP_STD,
    },
    ModelSpec {
        kind: ModelKind::LongClip,
        dim: 512,
        max_text_tokens: Some(248),
        image_size: 224,
        mean: CLIP_MEAN,
        std: CLIP_STD,
    },
    ModelSpec {
        kind: ModelKind::Clip2Video,
        dim: 512,
        max_text_tokens: Some(77),
        image_size: 224,
        mean: CLIP_MEAN,
        std: CLIP_STD,
    },
    ModelSpec {
        kind: ModelKind::Beit3,
        dim: 1024,
        max_text_tokens: Some(64),
        image_size: 384,
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    },
];

/// Spec for a model tag.
#[must_use]
pub fn spec_of(kind: ModelKind) -> &'static ModelSpec {
    MODEL_SPECS
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or(&MODEL_SPECS[0])
}

/// One embedding space's text and image encoder.
///
/// Implementations own their tokenization (including the deterministic
/// truncation for token-budgeted models) and their image preprocessing.
/// Every returned vector is L2-normalized, except an exactly-zero vector,
/// which is passed through as a degenerate but valid result.
pub trait QueryEncoder: Send + Sync {
    fn model(&self) -> ModelKind;
    fn dim(&self) -> u32;
    fn encode_text(&self, text: &str) -> Result<Vec<f32>>;
    fn encode_image(&self, image: &RgbImage) -> Result<Vec<f32>>;
}

impl std::fmt::Debug for dyn QueryEncoder + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEncoder")
            .field("model", &self.model())
            .field("dim", &self.dim())
            .finish()
    }
}

/// Registry of the encoders loaded at startup, keyed by model tag.
#[derive(Default)]
pub struct EncoderRegistry {
    map: BTreeMap<ModelKind, Box<dyn QueryEncoder>>,
}

impl EncoderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, encoder: Box<dyn QueryEncoder>) {
        self.map.insert(encoder.model(), encoder);
    }

    pub fn get(&self, model: ModelKind) -> Result<&dyn QueryEncoder> {
        self.map
            .get(&model)
            .map(|encoder| &**encoder)
            .ok_or(EngineError::ModelUnavailable { model })
    }

    #[must_use]
    pub fn contains(&self, model: ModelKind) -> bool {
        self.map.contains_key(&model)
    }

    /// Registered model tags, in tag order.
    #[must_use]
    pub fn models(&self) -> Vec<ModelKind> {
        self.map.keys().copied().collect()
    }
}

/// Euclidean norm.
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize in place. An all-zero vector stays zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v {
            *x /= norm;
        }
    }
}

/// True when `v` is exactly zero everywhere.
#[must_use]
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
