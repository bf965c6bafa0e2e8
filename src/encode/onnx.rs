//! ONNX-backed query encoders (CLIP, LongCLIP, BEiT-3).
//!
//! Each encoder wraps a text session, a vision session, and a tokenizer.
//! Weight and tokenizer paths come from the engine configuration; the model's
//! dimension, token window, and preprocessing constants come from the static
//! spec table. Sessions are run behind a mutex since `ort` requires exclusive
//! access during inference.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use crate::constants::HARD_TRUNCATE_BYTES;
use crate::error::{EngineError, Result};
use crate::types::ModelKind;

use super::truncate::{head_at_grapheme_boundary, truncate_for_budget};
use super::{ModelSpec, QueryEncoder, l2_normalize, preprocess, spec_of};

/// Text + vision encoder pair for one embedding space.
pub struct OnnxEncoder {
    spec: &'static ModelSpec,
    text_session: Mutex<Session>,
    vision_session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxEncoder {
    /// Load the sessions and tokenizer for `kind` from explicit paths.
    pub fn load(
        kind: ModelKind,
        text_model: &Path,
        vision_model: &Path,
        tokenizer_file: &Path,
    ) -> Result<Self> {
        let spec = spec_of(kind);
        let text_session = open_session(kind, text_model)?;
        let vision_session = open_session(kind, vision_model)?;
        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(|e| {
            EngineError::EncodeFailed {
                model: kind,
                cause: format!("tokenizer load: {e}"),
            }
        })?;
        tracing::info!(model = %kind, dim = spec.dim, "loaded onnx encoder");
        Ok(Self {
            spec,
            text_session: Mutex::new(text_session),
            vision_session: Mutex::new(vision_session),
            tokenizer,
        })
    }

    /// Tokenize into a fixed-length id window, padding with zeros.
    fn token_ids(&self, text: &str) -> Result<Vec<i64>> {
        let window = self
            .spec
            .max_text_tokens
            .unwrap_or(usize::from(u8::MAX));
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EngineError::TokenEncodingFailed {
                model: self.spec.kind,
                reason: e.to_string(),
            })?;
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        if ids.len() > window {
            return Err(EngineError::TokenEncodingFailed {
                model: self.spec.kind,
                reason: format!("{} tokens exceed the {window}-token window", ids.len()),
            });
        }
        ids.resize(window, 0);
        Ok(ids)
    }

    fn run_text(&self, ids: Vec<i64>) -> Result<Vec<f32>> {
        let window = ids.len();
        let input = Tensor::from_array(([1usize, window], ids)).map_err(|e| {
            EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: e.to_string(),
            }
        })?;
        let mut session = self
            .text_session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs!["input_ids" => input])
            .map_err(|e| EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: e.to_string(),
            })?;
        let value = outputs
            .values()
            .next()
            .ok_or_else(|| EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: "model produced no outputs".to_string(),
            })?;
        extract_embedding(self.spec, &value)
    }
}

fn open_session(kind: ModelKind, path: &Path) -> Result<Session> {
    Session::builder()
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| EngineError::BadIndexFile {
            path: path.to_path_buf(),
            reason: format!("onnx session for {kind}: {e}"),
        })
}

fn extract_embedding(spec: &ModelSpec, value: &ort::value::DynValue) -> Result<Vec<f32>> {
    let (_, data) =
        value
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::EncodeFailed {
                model: spec.kind,
                cause: e.to_string(),
            })?;
    let dim = spec.dim as usize;
    if data.len() < dim {
        return Err(EngineError::EncodeFailed {
            model: spec.kind,
            cause: format!("output holds {} floats, expected {dim}", data.len()),
        });
    }
    let mut vector = data[..dim].to_vec();
    l2_normalize(&mut vector);
    Ok(vector)
}

impl QueryEncoder for OnnxEncoder {
    fn model(&self) -> ModelKind {
        self.spec.kind
    }

    fn dim(&self) -> u32 {
        self.spec.dim
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let prepared = match self.spec.max_text_tokens {
            Some(window) => {
                let (kept, truncated) = truncate_for_budget(text, window);
                if truncated {
                    tracing::debug!(
                        model = %self.spec.kind,
                        original_bytes = text.len(),
                        kept_bytes = kept.len(),
                        "truncated over-length query text"
                    );
                }
                kept
            }
            None => text.to_string(),
        };

        // One hard-truncated retry before giving up on tokenization.
        let ids = match self.token_ids(&prepared) {
            Ok(ids) => ids,
            Err(first_err) => {
                let short = head_at_grapheme_boundary(&prepared, HARD_TRUNCATE_BYTES);
                tracing::debug!(
                    model = %self.spec.kind,
                    error = %first_err,
                    "tokenization failed, retrying hard-truncated"
                );
                self.token_ids(short)?
            }
        };
        self.run_text(ids)
    }

    fn encode_image(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let tensor = preprocess::preprocess(image, self.spec);
        let (c, h, w) = (tensor.shape()[0], tensor.shape()[1], tensor.shape()[2]);
        let data: Vec<f32> = tensor.into_iter().collect();
        let input =
            Tensor::from_array(([1usize, c, h, w], data)).map_err(|e| EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: e.to_string(),
            })?;
        let mut session = self
            .vision_session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs!["pixel_values" => input])
            .map_err(|e| EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: e.to_string(),
            })?;
        let value = outputs
            .values()
            .next()
            .ok_or_else(|| EngineError::EncodeFailed {
                model: self.spec.kind,
                cause: "model produced no outputs".to_string(),
            })?;
        extract_embedding(self.spec, &value)
    }
}
