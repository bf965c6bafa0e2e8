//! Per-video feature store.
//!
//! One `.npy` file per `(model, video_id)` holds that video's keyframe
//! embeddings as a row-major `F x D` f32 matrix in deterministic frame order.
//! Loads are on demand; recently used matrices stay in an LRU cache bounded by
//! total f32 entries. Concurrent readers share cached matrices; a cache miss
//! takes a per-key lock so the same file is never read twice in parallel. The
//! bookkeeping lock is never held across I/O.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use ndarray_npy::ReadNpyExt;

use crate::constants::{DEFAULT_CACHE_BUDGET_FLOATS, ROW_NORM_DRIFT};
use crate::error::{EngineError, Result};
use crate::types::ModelKind;

type Key = (ModelKind, String);

#[derive(Default)]
struct CacheState {
    map: HashMap<Key, Arc<Array2<f32>>>,
    // Front = least recently used.
    order: VecDeque<Key>,
    total_floats: usize,
}

impl CacheState {
    fn touch(&mut self, key: &Key) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.clone());
        }
    }

    fn insert(&mut self, key: Key, matrix: Arc<Array2<f32>>, budget: usize) {
        self.total_floats += matrix.len();
        self.map.insert(key.clone(), matrix);
        self.order.push_back(key);
        while self.total_floats > budget && self.order.len() > 1 {
            let Some(evict) = self.order.pop_front() else {
                break;
            };
            if let Some(gone) = self.map.remove(&evict) {
                self.total_floats -= gone.len();
                tracing::debug!(model = %evict.0, video = %evict.1, "evicted cached features");
            }
        }
    }
}

/// Random-access store of per-video embedding matrices.
pub struct FeatureStore {
    root: PathBuf,
    budget_floats: usize,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
}

impl FeatureStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_budget(root, DEFAULT_CACHE_BUDGET_FLOATS)
    }

    #[must_use]
    pub fn with_budget(root: impl Into<PathBuf>, budget_floats: usize) -> Self {
        Self {
            root: root.into(),
            budget_floats,
            state: Mutex::new(CacheState::default()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the feature file for `(model, video_id)`:
    /// `<root>/features-<model>/features/<video_id>.npy`.
    #[must_use]
    pub fn file_path(&self, model: ModelKind, video_id: &str) -> PathBuf {
        self.root
            .join(model.feature_dir())
            .join("features")
            .join(format!("{video_id}.npy"))
    }

    /// Load the `F x D` matrix for `(model, video_id)`, from cache when warm.
    /// Rows whose stored norm drifted are re-normalized. Fails with
    /// `UnknownVideo` when no usable matrix exists for the key.
    pub fn load(&self, model: ModelKind, video_id: &str) -> Result<Arc<Array2<f32>>> {
        let key: Key = (model, video_id.to_string());

        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        // Serialize loads of the same key; other keys proceed in parallel.
        let gate = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        let _guard = gate.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        // Another thread may have finished the load while we waited.
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let matrix = Arc::new(self.read_matrix(model, video_id)?);
        {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.insert(key.clone(), Arc::clone(&matrix), self.budget_floats);
        }
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&key);
        Ok(matrix)
    }

    fn cache_get(&self, key: &Key) -> Option<Arc<Array2<f32>>> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let hit = state.map.get(key).cloned();
        if hit.is_some() {
            state.touch(key);
        }
        hit
    }

    fn read_matrix(&self, model: ModelKind, video_id: &str) -> Result<Array2<f32>> {
        let path = self.file_path(model, video_id);
        let unknown = || EngineError::UnknownVideo {
            model,
            video_id: video_id.to_string(),
        };
        let file = fs_err::File::open(&path).map_err(|_| unknown())?;
        let mut matrix = Array2::<f32>::read_npy(file).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable feature file");
            unknown()
        })?;
        renormalize_rows(&mut matrix);
        tracing::debug!(
            model = %model,
            video = video_id,
            frames = matrix.nrows(),
            dim = matrix.ncols(),
            "loaded video features"
        );
        Ok(matrix)
    }

    /// Current cache occupancy in f32 entries.
    #[must_use]
    pub fn cached_floats(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).total_floats
    }
}

fn renormalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.rows_mut() {
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 && (norm - 1.0).abs() > ROW_NORM_DRIFT {
            row.mapv_inplace(|x| x / norm);
        }
    }
}
