//! Offline corpus construction.
//!
//! Builds a flat index plus its id-to-asset map from a per-video feature
//! tree. Videos are visited in sorted order and rows in frame order, so the
//! id space is deterministic for a given tree: row `j` of video `v` becomes
//! the next dense id, with its asset path derived from the standard keyframe
//! layout. The runtime engine never calls this; it exists for the indexing
//! pipeline and for rebuilds after feature extraction.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use ndarray::Array2;
use ndarray_npy::ReadNpyExt;

use crate::error::{EngineError, Result};
use crate::types::ModelKind;
use crate::types::asset;

use super::flat::FlatIpIndex;

/// A freshly built corpus: the index and the asset-map entries that describe
/// the same id space.
#[derive(Debug)]
pub struct BuiltCorpus {
    pub index: FlatIpIndex,
    pub entries: BTreeMap<String, String>,
}

impl BuiltCorpus {
    /// Write the index artifact and the asset-map JSON next to each other.
    pub fn write(&self, index_path: &Path, map_path: &Path) -> Result<()> {
        self.index.write(index_path)?;
        let json = serde_json::to_vec_pretty(&self.entries).map_err(|e| {
            EngineError::SizeMismatch {
                reason: format!("serializing asset map: {e}"),
            }
        })?;
        let mut file = atomic_write_file::AtomicWriteFile::open(map_path)?;
        file.write_all(&json)?;
        file.commit()?;
        Ok(())
    }
}

/// Build an index from `<features_root>/features-<model>/features/*.npy`.
///
/// `path_prefix` is prepended to every generated asset path, e.g.
/// `raw/keyframes`. Every matrix must share one embedding dimension; rows
/// are re-normalized as they are ingested.
pub fn build_from_features(
    features_root: &Path,
    model: ModelKind,
    path_prefix: &str,
) -> Result<BuiltCorpus> {
    let dir = features_root.join(model.feature_dir()).join("features");
    let mut videos: Vec<String> = Vec::new();
    for entry in fs_err::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(video_id) = name.strip_suffix(".npy") {
            videos.push(video_id.to_string());
        }
    }
    videos.sort();
    if videos.is_empty() {
        return Err(EngineError::SizeMismatch {
            reason: format!("no feature files under {}", dir.display()),
        });
    }

    let mut dim: Option<usize> = None;
    let mut rows: Vec<Vec<f32>> = Vec::new();
    let mut entries: BTreeMap<String, String> = BTreeMap::new();
    for video_id in &videos {
        let path = dir.join(format!("{video_id}.npy"));
        let file = fs_err::File::open(&path)?;
        let matrix = Array2::<f32>::read_npy(file).map_err(|e| EngineError::SizeMismatch {
            reason: format!("unreadable feature file {}: {e}", path.display()),
        })?;
        match dim {
            None => dim = Some(matrix.ncols()),
            Some(d) if d != matrix.ncols() => {
                return Err(EngineError::SizeMismatch {
                    reason: format!(
                        "{video_id} features are {}-dimensional, corpus is {d}-dimensional",
                        matrix.ncols()
                    ),
                });
            }
            Some(_) => {}
        }
        for (frame, row) in matrix.rows().into_iter().enumerate() {
            let id = rows.len();
            entries.insert(
                id.to_string(),
                format!("{path_prefix}/{}", asset::keyframe_path(video_id, frame)),
            );
            rows.push(row.to_vec());
        }
        tracing::debug!(video = %video_id, frames = matrix.nrows(), "ingested features");
    }

    let dim = dim.unwrap_or(0) as u32;
    let index = FlatIpIndex::from_rows(dim, rows)?;
    tracing::info!(
        model = %model,
        videos = videos.len(),
        keyframes = index.len(),
        dim,
        "built corpus index"
    );
    Ok(BuiltCorpus { index, entries })
}
