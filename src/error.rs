//! Error taxonomy for the retrieval core.
//!
//! Kinds follow the failure model of the engine: configuration/load errors are
//! fatal at startup, query errors surface verbatim to the caller, data-gap
//! errors are isolated inside aggregation loops, and cancellation is its own
//! kind. Every variant carries a human-readable cause plus a stable short code
//! (see [`EngineError::code`]) for structured logging.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ModelKind;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The vector index file is unreadable, truncated, or fails checksum.
    #[error("bad index file {path}: {reason}")]
    BadIndexFile { path: PathBuf, reason: String },

    /// The index declares a different embedding dimension than the model.
    #[error("dimension mismatch for {model}: index declares {actual}, expected {expected}")]
    DimMismatch {
        model: ModelKind,
        expected: u32,
        actual: u32,
    },

    /// Index size, asset-map size, or asset-map key contiguity disagree.
    #[error("size mismatch: {reason}")]
    SizeMismatch { reason: String },

    /// A search query vector violates the index preconditions.
    #[error("invalid query vector: {reason}")]
    InvalidQueryVector { reason: String },

    /// Text could not be tokenized even after deterministic truncation.
    #[error("token encoding failed for {model}: {reason}")]
    TokenEncodingFailed { model: ModelKind, reason: String },

    /// An image source could not be fetched or decoded.
    #[error("failed to load image from {source_desc}: {cause}")]
    ImageLoadFailed { source_desc: String, cause: String },

    /// Encoder inference failed after successful input preparation.
    #[error("encoder failed for {model}: {cause}")]
    EncodeFailed { model: ModelKind, cause: String },

    /// No index or encoder is registered for the requested model.
    #[error("model {model} is not available")]
    ModelUnavailable { model: ModelKind },

    /// A keyframe id beyond the index bounds was requested.
    #[error("unknown keyframe id {id} (index holds {len} vectors)")]
    UnknownId { id: u64, len: u64 },

    /// No per-video feature matrix exists for the requested key.
    #[error("no {model} features for video {video_id}")]
    UnknownVideo { model: ModelKind, video_id: String },

    /// The external translator could not serve the request.
    #[error("translator unavailable: {reason}")]
    TranslatorUnavailable { reason: String },

    /// An HTTP fetch failed at the transport level.
    #[error("http fetch failed for {url}: {cause}")]
    HttpFetchFailed { url: String, cause: String },

    /// The per-request cancellation signal fired.
    #[error("request cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Stable short code for logging and metrics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadIndexFile { .. } => "bad_index_file",
            Self::DimMismatch { .. } => "dim_mismatch",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::InvalidQueryVector { .. } => "invalid_query_vector",
            Self::TokenEncodingFailed { .. } => "token_encoding_failed",
            Self::ImageLoadFailed { .. } => "image_load_failed",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::UnknownId { .. } => "unknown_id",
            Self::UnknownVideo { .. } => "unknown_video",
            Self::TranslatorUnavailable { .. } => "translator_unavailable",
            Self::HttpFetchFailed { .. } => "http_fetch_failed",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }

    /// Data-gap errors are treated as empty results inside aggregation loops
    /// (temporal per-video scoring, multi-model fusion) and surfaced verbatim
    /// everywhere else.
    #[must_use]
    pub fn is_data_gap(&self) -> bool {
        matches!(self, Self::UnknownId { .. } | Self::UnknownVideo { .. })
    }
}
