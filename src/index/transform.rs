//! Transforms: sorting, flips, concatenation, slicing, dtype conversion
//!
//! Every transform states what metadata and caches its result keeps. The
//! rule throughout is that a cache or claim survives only when the
//! transform provably preserves it; anything uncertain is dropped rather
//! than recomputed eagerly.

use crate::array::Array;
use crate::dtype::DType;
use crate::error::{Error, Result};

use super::cache::stable_argsort;
use super::core::{EdgeIndex, SortOrder};

/// Result of converting an index to another dtype
///
/// Conversion to an integer dtype keeps the container (and its caches);
/// conversion to a float dtype loses the coordinate semantics and degrades
/// to a plain array.
#[derive(Debug, Clone)]
pub enum CastResult {
    /// The container survived the conversion
    Index(EdgeIndex),
    /// The conversion left the integer domain; only the raw data remains
    Array(Array),
}

impl CastResult {
    /// The contained index, if the container survived
    pub fn index(self) -> Option<EdgeIndex> {
        match self {
            Self::Index(index) => Some(index),
            Self::Array(_) => None,
        }
    }

    /// The raw array, if the container degraded
    pub fn array(self) -> Option<Array> {
        match self {
            Self::Index(_) => None,
            Self::Array(array) => Some(array),
        }
    }
}

/// Plain-data snapshot of an index for persistence
///
/// Coordinates are widened to `i64`; the dtype field restores the original
/// width on load. Of the caches only `indptr` is worth persisting, the
/// transpose caches are cheap enough to rebuild.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeIndexState {
    /// Source coordinates
    pub row: Vec<i64>,
    /// Destination coordinates
    pub col: Vec<i64>,
    /// Coordinate dtype to restore
    pub dtype: DType,
    /// Declared matrix dimensions
    pub sparse_size: (Option<usize>, Option<usize>),
    /// Claimed sort order
    pub sort_order: Option<SortOrder>,
    /// Whether the edge set is symmetric
    pub is_undirected: bool,
    /// Cached compressed pointers, if they were computed
    pub indptr: Option<Vec<i64>>,
}

fn invert_perm(perm: &[i64]) -> Vec<i64> {
    let mut inv = vec![0i64; perm.len()];
    for (e, &p) in perm.iter().enumerate() {
        inv[p as usize] = e as i64;
    }
    inv
}

impl EdgeIndex {
    fn gather_edges(&self, perm: &[usize]) -> Result<Array> {
        let row = self.row_vec()?;
        let col = self.col_vec()?;
        let mut host = Vec::with_capacity(2 * perm.len());
        host.extend(perm.iter().map(|&e| row[e]));
        host.extend(perm.iter().map(|&e| col[e]));
        Array::from_i64_slice(&host, &[2, perm.len()], self.dtype())
    }

    /// Sort the edges by the given axis
    ///
    /// Returns the sorted index together with the `I64` permutation that
    /// maps positions in the result back to positions in `self` (usable to
    /// permute per-edge values). Sorting is stable. Three cases:
    ///
    /// - already sorted by `order`: the result is a cheap clone and the
    ///   permutation is the identity
    /// - sorted by the opposite axis: the cached transpose permutation is
    ///   used and the caches migrate to the result
    /// - unsorted: a fresh stable sort keyed on `order` alone
    pub fn sort_by(&mut self, order: SortOrder) -> Result<(EdgeIndex, Array)> {
        if self.sort_order == Some(order) {
            return Ok((self.clone(), Array::arange(self.num_edges())));
        }

        if self.sort_order == Some(order.opposite()) {
            let perm = self.get_t_perm()?;
            let mut out = EdgeIndex::new(self.get_t_index()?)?;
            out.sparse_size = self.sparse_size;
            out.sort_order = Some(order);
            out.is_undirected = self.is_undirected;
            out.indptr = if self.is_undirected {
                self.indptr.clone()
            } else {
                self.t_indptr.clone()
            };
            out.t_index = Some(self.data.clone());
            out.t_perm = Some(Array::try_from_slice(
                &invert_perm(&perm.to_i64_vec()?),
                &[self.num_edges()],
            )?);
            out.t_indptr = if self.is_undirected {
                None
            } else {
                self.indptr.clone()
            };
            return Ok((out, perm));
        }

        let keys = self.axis_vec(order)?;
        let perm = stable_argsort(&keys);
        let mut out = EdgeIndex::new(self.gather_edges(&perm)?)?;
        out.sparse_size = self.sparse_size;
        out.sort_order = Some(order);
        out.is_undirected = self.is_undirected;
        let perm: Vec<i64> = perm.into_iter().map(|e| e as i64).collect();
        Ok((out, Array::try_from_slice(&perm, &[keys.len()])?))
    }

    /// Swap the coordinate rows (matrix transpose)
    ///
    /// A row-sorted index becomes col-sorted and vice versa. All caches
    /// carry over: the sorted-axis keys are unchanged, so `indptr` and the
    /// transpose permutation remain valid; the transposed coordinates just
    /// swap their rows.
    pub fn flip_coords(&self) -> Result<EdgeIndex> {
        let row = self.row_vec()?;
        let col = self.col_vec()?;
        let mut host = Vec::with_capacity(2 * row.len());
        host.extend_from_slice(&col);
        host.extend_from_slice(&row);
        let mut out = EdgeIndex::new(Array::from_i64_slice(
            &host,
            &[2, row.len()],
            self.dtype(),
        )?)?;
        out.sparse_size = (self.sparse_size.1, self.sparse_size.0);
        out.sort_order = self.sort_order.map(SortOrder::opposite);
        out.is_undirected = self.is_undirected;
        out.indptr = self.indptr.clone();
        out.t_perm = self.t_perm.clone();
        out.t_indptr = self.t_indptr.clone();
        out.t_index = match &self.t_index {
            Some(t_index) => {
                let mut swapped = t_index.row(1)?.to_i64_vec()?;
                swapped.extend(t_index.row(0)?.to_i64_vec()?);
                Some(Array::from_i64_slice(
                    &swapped,
                    &[2, row.len()],
                    self.dtype(),
                )?)
            }
            None => None,
        };
        Ok(out)
    }

    /// Reverse the edge order
    ///
    /// An ascending sort becomes descending, so the sort claim and all
    /// caches are dropped; sparse size and undirectedness survive.
    pub fn flip_edges(&self) -> Result<EdgeIndex> {
        let perm: Vec<usize> = (0..self.num_edges()).rev().collect();
        let mut out = EdgeIndex::new(self.gather_edges(&perm)?)?;
        out.sparse_size = self.sparse_size;
        out.is_undirected = self.is_undirected;
        Ok(out)
    }

    /// Concatenate indices along the edge dimension
    ///
    /// The result size is the per-dimension maximum when every part knows
    /// its size. The sort claim survives only when every part claims the
    /// same order and each boundary key pair is non-decreasing, which is
    /// checked in constant time per boundary. Undirectedness survives only
    /// when every part is undirected.
    pub fn cat(parts: &[&EdgeIndex]) -> Result<EdgeIndex> {
        let first = *parts
            .first()
            .ok_or_else(|| Error::invalid_argument("parts", "empty concatenation"))?;
        let arrays: Vec<&Array> = parts.iter().map(|p| p.as_array()).collect();
        let mut out = EdgeIndex::new(Array::cat(&arrays, 1)?)?;

        out.sparse_size = (
            parts
                .iter()
                .map(|p| p.sparse_size.0)
                .try_fold(0usize, |acc, n| n.map(|n| acc.max(n))),
            parts
                .iter()
                .map(|p| p.sparse_size.1)
                .try_fold(0usize, |acc, n| n.map(|n| acc.max(n))),
        );
        out.is_undirected = parts.iter().all(|p| p.is_undirected);

        if let Some(order) = first.sort_order {
            let axis = match order {
                SortOrder::Row => 0,
                SortOrder::Col => 1,
            };
            let mut sorted = parts.iter().all(|p| p.sort_order == Some(order));
            if sorted {
                let mut last_key: Option<i64> = None;
                for part in parts {
                    if part.num_edges() == 0 {
                        continue;
                    }
                    let head = part.as_array().i64_at(&[axis, 0])?;
                    let tail = part.as_array().i64_at(&[axis, part.num_edges() - 1])?;
                    if last_key.is_some_and(|last| last > head) {
                        sorted = false;
                        break;
                    }
                    last_key = Some(tail);
                }
            }
            if sorted {
                out.sort_order = Some(order);
            }
        }
        Ok(out)
    }

    /// A contiguous range of edges
    ///
    /// Equivalent to `slice(start, start + length, 1)`.
    pub fn narrow(&self, start: usize, length: usize) -> Result<EdgeIndex> {
        self.slice(start, start + length, 1)
    }

    /// A strided range of edges
    ///
    /// Any subsequence of a sorted index stays sorted, so the sort claim
    /// and sparse size survive. Undirectedness does not: dropping edges can
    /// break symmetry.
    pub fn slice(&self, start: usize, end: usize, step: usize) -> Result<EdgeIndex> {
        if step == 0 {
            return Err(Error::invalid_argument("step", "step must be positive"));
        }
        if start > end || end > self.num_edges() {
            return Err(Error::invalid_argument(
                "range",
                format!(
                    "range {}..{} invalid for {} edges",
                    start,
                    end,
                    self.num_edges()
                ),
            ));
        }
        let perm: Vec<usize> = (start..end).step_by(step).collect();
        let mut out = EdgeIndex::new(self.gather_edges(&perm)?)?;
        out.sparse_size = self.sparse_size;
        out.sort_order = self.sort_order;
        Ok(out)
    }

    /// Gather edges by position
    ///
    /// `indices` must be a 1-D integer array; positions are bounds-checked.
    /// An arbitrary gather can reorder and repeat edges, so only the sparse
    /// size survives.
    pub fn index_select(&self, indices: &Array) -> Result<EdgeIndex> {
        if indices.ndim() != 1 {
            return Err(Error::shape_mismatch(&[indices.numel()], indices.shape()));
        }
        let num_edges = self.num_edges();
        let perm = indices
            .to_i64_vec()?
            .into_iter()
            .map(|e| {
                if e < 0 || e >= num_edges as i64 {
                    Err(Error::IndexOutOfBounds {
                        index: e.max(0) as usize,
                        size: num_edges,
                    })
                } else {
                    Ok(e as usize)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let mut out = EdgeIndex::new(self.gather_edges(&perm)?)?;
        out.sparse_size = self.sparse_size;
        Ok(out)
    }

    /// Keep the edges where the mask is true
    ///
    /// The mask must have one entry per edge. Masking preserves relative
    /// order, so the sort claim survives alongside the sparse size.
    pub fn mask_select(&self, mask: &[bool]) -> Result<EdgeIndex> {
        if mask.len() != self.num_edges() {
            return Err(Error::shape_mismatch(&[self.num_edges()], &[mask.len()]));
        }
        let perm: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(e, &keep)| keep.then_some(e))
            .collect();
        let mut out = EdgeIndex::new(self.gather_edges(&perm)?)?;
        out.sparse_size = self.sparse_size;
        out.sort_order = self.sort_order;
        Ok(out)
    }

    /// Convert the coordinates to another dtype
    ///
    /// Integer targets keep the container: metadata carries over unchanged
    /// and the cached transposed coordinates are converted along. A float
    /// target cannot represent coordinates, so the result degrades to a
    /// plain array of the converted data.
    pub fn cast(&self, dtype: DType) -> Result<CastResult> {
        if dtype.is_float() {
            return Ok(CastResult::Array(self.data.cast(dtype)?));
        }
        let mut out = self.clone();
        out.data = self.data.cast(dtype)?;
        out.t_index = match &self.t_index {
            Some(t_index) => Some(t_index.cast(dtype)?),
            None => None,
        };
        Ok(CastResult::Index(out))
    }

    /// Snapshot the index as plain data
    pub fn state(&self) -> Result<EdgeIndexState> {
        Ok(EdgeIndexState {
            row: self.row_vec()?,
            col: self.col_vec()?,
            dtype: self.dtype(),
            sparse_size: self.sparse_size,
            sort_order: self.sort_order,
            is_undirected: self.is_undirected,
            indptr: match &self.indptr {
                Some(indptr) => Some(indptr.to_i64_vec()?),
                None => None,
            },
        })
    }

    /// Restore an index from a snapshot
    ///
    /// The persisted `indptr` is only adopted when a sort order is claimed,
    /// matching the invariant that caches exist only on sorted indices, and
    /// must be a well-formed pointer array; anything malformed is rejected
    /// rather than served as a cache hit later.
    pub fn from_state(state: EdgeIndexState) -> Result<EdgeIndex> {
        if state.row.len() != state.col.len() {
            return Err(Error::shape_mismatch(&[state.row.len()], &[state.col.len()]));
        }
        let mut host = Vec::with_capacity(2 * state.row.len());
        host.extend_from_slice(&state.row);
        host.extend_from_slice(&state.col);
        let data = Array::from_i64_slice(&host, &[2, state.row.len()], state.dtype)?;
        let mut out = EdgeIndex::new(data)?;
        out.sparse_size = state.sparse_size;
        out.sort_order = state.sort_order;
        out.is_undirected = state.is_undirected;
        if let (Some(indptr), Some(order)) = (state.indptr, state.sort_order) {
            let indptr = Array::try_from_slice(&indptr, &[indptr.len()])?;
            out.check_pointer_array(&indptr, order, "indptr")?;
            out.indptr = Some(indptr);
        }
        Ok(out)
    }
}
