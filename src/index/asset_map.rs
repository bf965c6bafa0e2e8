//! Id-to-asset mapping shared by every embedding index.
//!
//! Loaded once from a JSON object of stringified integer ids to relative
//! keyframe paths. Keys must be unique and contiguous over `[0, N)`; a gap is
//! a fatal configuration error, not a runtime fault. The same id denotes the
//! same keyframe in every index, so one map serves all models.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::types::KeyframeId;
use crate::types::asset;

/// Immutable id-to-path map with per-video groupings.
#[derive(Debug, Clone)]
pub struct IdAssetMap {
    paths: Vec<String>,
    by_video: BTreeMap<String, Vec<KeyframeId>>,
}

impl IdAssetMap {
    /// Load the map from its JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs_err::read(path)?;
        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::SizeMismatch {
                reason: format!("malformed asset map {}: {e}", path.display()),
            })?;
        Self::from_entries(raw)
    }

    /// Build the map from already-parsed entries; exposed for the offline
    /// builder and tests.
    pub fn from_entries(entries: BTreeMap<String, String>) -> Result<Self> {
        let count = entries.len();
        let mut paths: Vec<Option<String>> = vec![None; count];
        for (key, value) in entries {
            let id: usize = key.parse().map_err(|_| EngineError::SizeMismatch {
                reason: format!("asset map key {key:?} is not an integer"),
            })?;
            if id >= count {
                return Err(EngineError::SizeMismatch {
                    reason: format!("asset map key {id} outside contiguous range [0, {count})"),
                });
            }
            paths[id] = Some(asset::canonicalize_slashes(&value));
        }
        let paths: Vec<String> = paths
            .into_iter()
            .enumerate()
            .map(|(id, p)| {
                p.ok_or_else(|| EngineError::SizeMismatch {
                    reason: format!("asset map missing id {id}"),
                })
            })
            .collect::<Result<_>>()?;

        let mut by_video: BTreeMap<String, Vec<KeyframeId>> = BTreeMap::new();
        for (id, path) in paths.iter().enumerate() {
            if let Some(video) = asset::video_id_of(path) {
                by_video
                    .entry(video.to_string())
                    .or_default()
                    .push(id as KeyframeId);
            }
        }
        for ids in by_video.values_mut() {
            // Frame order, not insertion order; ids need not be contiguous
            // per video.
            ids.sort_by_key(|&id| {
                (
                    asset::frame_no_of(&paths[id as usize]).unwrap_or(u32::MAX),
                    id,
                )
            });
        }

        tracing::info!(keyframes = paths.len(), videos = by_video.len(), "loaded asset map");
        Ok(Self { paths, by_video })
    }

    /// Convenience constructor from an ordered path list (id = position).
    pub fn from_paths(paths: Vec<String>) -> Result<Self> {
        let entries = paths
            .into_iter()
            .enumerate()
            .map(|(id, p)| (id.to_string(), p))
            .collect();
        Self::from_entries(entries)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.paths.len() as u64
    }

    #[must_use]
    pub fn path_of(&self, id: KeyframeId) -> Option<&str> {
        self.paths.get(id as usize).map(String::as_str)
    }

    #[must_use]
    pub fn video_of(&self, id: KeyframeId) -> Option<&str> {
        self.path_of(id).and_then(asset::video_id_of)
    }

    #[must_use]
    pub fn batch_of(&self, id: KeyframeId) -> Option<&str> {
        self.video_of(id).map(asset::batch_of)
    }

    #[must_use]
    pub fn frame_no_of(&self, id: KeyframeId) -> Option<u32> {
        self.path_of(id).and_then(asset::frame_no_of)
    }

    /// Ids of a video's keyframes, sorted by ascending frame number.
    /// Empty for unknown videos.
    #[must_use]
    pub fn ids_of_video(&self, video_id: &str) -> &[KeyframeId] {
        self.by_video.get(video_id).map_or(&[], Vec::as_slice)
    }

    /// All known video ids, sorted.
    pub fn videos(&self) -> impl Iterator<Item = &str> {
        self.by_video.keys().map(String::as_str)
    }
}
