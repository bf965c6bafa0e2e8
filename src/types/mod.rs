//! Public types exposed by the `framesearch-core` crate.

pub mod asset;
pub mod common;
pub mod image;
pub mod search;

pub use common::{KeyframeId, ModelKind, ModelSelect};
pub use image::ImageSource;
pub use search::{
    FusionMethod, Hit, RankedUnit, SentenceShortlist, TemporalHit, TemporalOptions,
    TemporalResponse,
};
