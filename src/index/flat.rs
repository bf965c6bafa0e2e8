//! Flat inner-product index over L2-normalized vectors.
//!
//! Exact exhaustive scan; no training phase, no approximation. Ids are dense
//! `[0, N)` and shared with the asset map. The on-disk artifact is a fixed
//! little-endian layout: magic, format version, dimension, count, a BLAKE3
//! checksum of the vector payload, then the row-major f32 data.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::constants::{NORM_TOLERANCE, SENTINEL_ID};
use crate::error::{EngineError, Result};

const MAGIC: [u8; 4] = *b"FSIX";
const FORMAT_VERSION: u16 = 1;
// magic + version + reserved + dim + count + checksum
const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 8 + 32;

/// Exact flat index for one embedding space.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: u32,
    vectors: Vec<f32>,
}

#[derive(PartialEq)]
struct Candidate {
    score: f32,
    id: u64,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score first; equal scores break toward the lower id.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FlatIpIndex {
    /// Build an index from rows. Rows must be finite and of the declared
    /// dimension; non-zero rows are re-normalized, matching the offline
    /// builder's behavior.
    pub fn from_rows(dim: u32, rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim_usize = dim as usize;
        let mut vectors = Vec::with_capacity(rows.len() * dim_usize);
        for (id, mut row) in rows.into_iter().enumerate() {
            if row.len() != dim_usize {
                return Err(EngineError::SizeMismatch {
                    reason: format!(
                        "row {id} has {} components, index dimension is {dim}",
                        row.len()
                    ),
                });
            }
            if row.iter().any(|x| !x.is_finite()) {
                return Err(EngineError::SizeMismatch {
                    reason: format!("row {id} contains a non-finite component"),
                });
            }
            crate::encode::l2_normalize(&mut row);
            vectors.extend_from_slice(&row);
        }
        Ok(Self { dim, vectors })
    }

    /// Load an index artifact, verifying magic, version, checksum, and
    /// payload length. When `expected_dim` is given, a differing stored
    /// dimension is rejected at load time.
    pub fn open(path: &Path, expected_dim: Option<u32>) -> Result<Self> {
        let file = fs_err::File::open(path)?;
        let map = unsafe { Mmap::map(file.file())? };
        let bad = |reason: &str| EngineError::BadIndexFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if map.len() < HEADER_LEN {
            return Err(bad("file shorter than header"));
        }
        if map[0..4] != MAGIC {
            return Err(bad("bad magic"));
        }
        let version = u16::from_le_bytes([map[4], map[5]]);
        if version != FORMAT_VERSION {
            return Err(bad(&format!("unsupported format version {version}")));
        }
        let dim = u32::from_le_bytes([map[8], map[9], map[10], map[11]]);
        let count = u64::from_le_bytes(
            map[12..20]
                .try_into()
                .map_err(|_| bad("truncated header"))?,
        );
        let stored_checksum: [u8; 32] = map[20..52]
            .try_into()
            .map_err(|_| bad("truncated header"))?;

        if dim == 0 {
            return Err(bad("zero dimension"));
        }
        let payload_len = (count as usize)
            .checked_mul(dim as usize)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN).map(|_| n))
            .ok_or_else(|| bad("vector count overflows"))?;
        let payload = map
            .get(HEADER_LEN..HEADER_LEN + payload_len)
            .ok_or_else(|| bad("payload shorter than declared count"))?;
        if map.len() != HEADER_LEN + payload_len {
            return Err(bad("trailing bytes after payload"));
        }
        if *blake3::hash(payload).as_bytes() != stored_checksum {
            return Err(bad("payload checksum mismatch"));
        }

        // Model attribution for dimension mismatches happens in the engine,
        // which knows which tag this file backs; here we only know the file.
        if let Some(expected) = expected_dim {
            if expected != dim {
                return Err(bad(&format!(
                    "dimension {dim} does not match expected {expected}"
                )));
            }
        }

        let mut vectors = Vec::with_capacity(payload_len / 4);
        for chunk in payload.chunks_exact(4) {
            vectors.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        tracing::info!(
            path = %path.display(),
            dim,
            count,
            "loaded flat index"
        );
        Ok(Self { dim, vectors })
    }

    /// Write the artifact atomically (used by the offline index builder).
    pub fn write(&self, path: &Path) -> Result<()> {
        let payload: Vec<u8> = self.vectors.iter().flat_map(|x| x.to_le_bytes()).collect();
        let checksum = blake3::hash(&payload);

        let mut file = atomic_write_file::AtomicWriteFile::open(path)?;
        file.write_all(&MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&[0u8; 2])?;
        file.write_all(&self.dim.to_le_bytes())?;
        file.write_all(&self.len().to_le_bytes())?;
        file.write_all(checksum.as_bytes())?;
        file.write_all(&payload)?;
        file.commit()?;
        Ok(())
    }

    #[must_use]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        (self.vectors.len() / self.dim as usize) as u64
    }

    fn row(&self, id: usize) -> &[f32] {
        let dim = self.dim as usize;
        &self.vectors[id * dim..(id + 1) * dim]
    }

    /// Exact top-`k` inner-product search, sorted by descending score with
    /// ties broken by ascending id. When fewer than `k` vectors exist, the
    /// tail is padded with `(-inf, SENTINEL_ID)`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<(Vec<f32>, Vec<u64>)> {
        self.validate_query(query)?;
        if k == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        // Min-heap of the best k candidates seen so far.
        let mut heap: BinaryHeap<std::cmp::Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);
        for id in 0..self.len() as usize {
            let score = dot(self.row(id), query);
            heap.push(std::cmp::Reverse(Candidate {
                score,
                id: id as u64,
            }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut best: Vec<Candidate> = heap.into_iter().map(|r| r.0).collect();
        best.sort_by(|a, b| b.cmp(a));

        let mut scores = Vec::with_capacity(k);
        let mut ids = Vec::with_capacity(k);
        for cand in &best {
            scores.push(cand.score);
            ids.push(cand.id);
        }
        while scores.len() < k {
            scores.push(f32::NEG_INFINITY);
            ids.push(SENTINEL_ID);
        }
        Ok((scores, ids))
    }

    /// Copy of the stored vector for `id`.
    pub fn reconstruct(&self, id: u64) -> Result<Vec<f32>> {
        if id >= self.len() {
            return Err(EngineError::UnknownId {
                id,
                len: self.len(),
            });
        }
        Ok(self.row(id as usize).to_vec())
    }

    fn validate_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dim as usize {
            return Err(EngineError::InvalidQueryVector {
                reason: format!(
                    "query has {} components, index dimension is {}",
                    query.len(),
                    self.dim
                ),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::InvalidQueryVector {
                reason: "query contains a non-finite component".into(),
            });
        }
        let norm = crate::encode::l2_norm(query);
        if (norm - 1.0).abs() > NORM_TOLERANCE {
            return Err(EngineError::InvalidQueryVector {
                reason: format!("query norm {norm} is not within tolerance of 1"),
            });
        }
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
