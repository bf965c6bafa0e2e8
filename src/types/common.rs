//! Model tags and id aliases shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense keyframe id, shared by every embedding index and the asset map.
pub type KeyframeId = u64;

/// Closed set of embedding spaces the engine can serve.
///
/// Dispatch happens on this tag everywhere; there is no string-keyed model
/// lookup and no fallback from one space to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Clip,
    LongClip,
    Clip2Video,
    Beit3,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Clip,
        ModelKind::LongClip,
        ModelKind::Clip2Video,
        ModelKind::Beit3,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Clip => "clip",
            ModelKind::LongClip => "longclip",
            ModelKind::Clip2Video => "clip2video",
            ModelKind::Beit3 => "beit3",
        }
    }

    /// Case-insensitive parse of the canonical tag names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "clip" => Some(ModelKind::Clip),
            "longclip" => Some(ModelKind::LongClip),
            "clip2video" => Some(ModelKind::Clip2Video),
            "beit3" => Some(ModelKind::Beit3),
            _ => None,
        }
    }

    /// Directory name of this model's per-video feature tree,
    /// e.g. `features-longclip`.
    #[must_use]
    pub fn feature_dir(self) -> String {
        format!("features-{}", self.as_str())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level model selector: a single space, or fan out over all loaded
/// spaces and fuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelect {
    One(ModelKind),
    All,
}

impl ModelSelect {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Some(ModelSelect::All);
        }
        ModelKind::parse(s).map(ModelSelect::One)
    }
}
