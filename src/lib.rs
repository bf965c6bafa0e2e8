#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: internal helpers are self-documenting; public APIs
// still carry proper docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: casts here are bounded by real-world sizes (frame counts,
// embedding dimensions, shortlist lengths).
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: retrieval pipelines naturally have long orchestration
// functions; breaking them up would hurt readability.
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unnecessary_wraps)]

/// The framesearch-core crate version (matches `Cargo.toml`).
pub const FRAMESEARCH_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod constants;
pub mod encode;
pub mod engine;
pub mod error;
pub mod features;
pub mod index;
pub mod translate;
pub mod types;

pub use config::{EngineConfig, ModelPaths, ScoreFloors};
#[cfg(feature = "onnx")]
pub use encode::onnx::OnnxEncoder;
pub use encode::{EncoderRegistry, MODEL_SPECS, ModelSpec, QueryEncoder, spec_of};
pub use engine::{CancelToken, Engine, EngineParts, EngineStats};
pub use error::{EngineError, Result};
pub use features::FeatureStore;
pub use index::{BuiltCorpus, FlatIpIndex, IdAssetMap, build_from_features};
pub use translate::{IdentityTranslator, Translate};
pub use types::{
    FusionMethod, Hit, ImageSource, KeyframeId, ModelKind, ModelSelect, RankedUnit,
    SentenceShortlist, TemporalHit, TemporalOptions, TemporalResponse,
};
