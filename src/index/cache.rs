//! Lazy computation of derived structures
//!
//! All caches are derived from the coordinate data plus the claimed sort
//! order. `indptr` compresses the sorted axis; `t_perm` is the stable
//! permutation taking the edges into the opposite order, `t_index` the
//! coordinates under that permutation, and `t_indptr` the compressed
//! pointers of the permuted ordering. Getters compute on first use and
//! return cheap storage-sharing clones afterwards.

use crate::array::Array;
use crate::error::{Error, Result};

use super::core::{EdgeIndex, SortOrder};

/// Compressed pointer vector for sorted coordinate keys
///
/// Output has length `n + 1`; `out[k + 1] - out[k]` is the number of keys
/// equal to `k`. Keys must lie in `0..n`.
pub(crate) fn build_indptr(keys: &[i64], n: usize) -> Result<Vec<i64>> {
    let mut counts = vec![0i64; n + 1];
    for &key in keys {
        if key < 0 || key >= n as i64 {
            return Err(Error::IndexOutOfBounds {
                index: key.max(0) as usize,
                size: n,
            });
        }
        counts[key as usize + 1] += 1;
    }
    for k in 0..n {
        counts[k + 1] += counts[k];
    }
    Ok(counts)
}

/// Stable permutation sorting `keys` ascending
///
/// Ties keep their original relative order, so applying this to an index
/// already sorted by the other axis yields a lexicographic ordering.
pub(crate) fn stable_argsort(keys: &[i64]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..keys.len()).collect();
    perm.sort_by_key(|&e| keys[e]);
    perm
}

impl EdgeIndex {
    fn axis_size(&mut self, axis: SortOrder) -> Result<usize> {
        match axis {
            SortOrder::Row => self.get_num_rows(),
            SortOrder::Col => self.get_num_cols(),
        }
    }

    fn require_sort_order(&self) -> Result<SortOrder> {
        self.sort_order.ok_or(Error::InvalidState {
            expected: "a sorted index",
        })
    }

    /// Compressed pointers over the sorted axis
    ///
    /// Requires a claimed sort order. The result has dtype `I64` and length
    /// `n + 1` where `n` is the size of the sorted axis.
    pub fn get_indptr(&mut self) -> Result<Array> {
        let order = self.require_sort_order()?;
        if let Some(indptr) = &self.indptr {
            return Ok(indptr.clone());
        }
        let n = self.axis_size(order)?;
        let keys = self.axis_vec(order)?;
        let indptr = Array::try_from_slice(&build_indptr(&keys, n)?, &[n + 1])?;
        self.indptr = Some(indptr.clone());
        Ok(indptr)
    }

    /// Stable permutation into the opposite sort order
    ///
    /// `I64`, length `E`. Applying it to the edges produces an ordering
    /// sorted by the opposite axis with the current axis breaking ties.
    pub fn get_t_perm(&mut self) -> Result<Array> {
        let order = self.require_sort_order()?;
        if let Some(perm) = &self.t_perm {
            return Ok(perm.clone());
        }
        let keys = self.axis_vec(order.opposite())?;
        let host: Vec<i64> = stable_argsort(&keys).into_iter().map(|e| e as i64).collect();
        let perm = Array::try_from_slice(&host, &[keys.len()])?;
        self.t_perm = Some(perm.clone());
        Ok(perm)
    }

    /// Coordinates permuted into the opposite sort order
    ///
    /// Same shape and dtype as the underlying coordinate array.
    pub fn get_t_index(&mut self) -> Result<Array> {
        if let Some(t_index) = &self.t_index {
            return Ok(t_index.clone());
        }
        let perm = self.get_t_perm()?.to_i64_vec()?;
        let row = self.row_vec()?;
        let col = self.col_vec()?;
        let mut host = Vec::with_capacity(2 * perm.len());
        host.extend(perm.iter().map(|&e| row[e as usize]));
        host.extend(perm.iter().map(|&e| col[e as usize]));
        let t_index = Array::from_i64_slice(&host, &[2, perm.len()], self.dtype())?;
        self.t_index = Some(t_index.clone());
        Ok(t_index)
    }

    /// Compressed pointers of the transposed ordering
    ///
    /// For an undirected index this is the same vector as
    /// [`Self::get_indptr`] and no separate cache is kept.
    pub fn get_t_indptr(&mut self) -> Result<Array> {
        if self.is_undirected {
            return self.get_indptr();
        }
        let order = self.require_sort_order()?;
        if let Some(t_indptr) = &self.t_indptr {
            return Ok(t_indptr.clone());
        }
        let axis = order.opposite();
        let n = self.axis_size(axis)?;
        let t_index = self.get_t_index()?;
        let keys = match axis {
            SortOrder::Row => t_index.row(0)?.to_i64_vec()?,
            SortOrder::Col => t_index.row(1)?.to_i64_vec()?,
        };
        let t_indptr = Array::try_from_slice(&build_indptr(&keys, n)?, &[n + 1])?;
        self.t_indptr = Some(t_indptr.clone());
        Ok(t_indptr)
    }

    /// Compute every derived structure in one go
    ///
    /// Requires a claimed sort order. Atomic with respect to cache state:
    /// everything is computed on a staged copy (cheap, storage is shared)
    /// and committed only when all of it succeeded, so a failure leaves
    /// the caches exactly as they were. Afterwards all getters are cache
    /// hits and `&self` access through the cached fields is possible.
    pub fn fill_cache_(&mut self) -> Result<&mut Self> {
        self.require_sort_order()?;
        let mut staged = self.clone();
        staged.get_indptr()?;
        staged.get_t_perm()?;
        staged.get_t_index()?;
        staged.get_t_indptr()?;
        self.sparse_size = staged.sparse_size;
        self.indptr = staged.indptr;
        self.t_perm = staged.t_perm;
        self.t_index = staged.t_index;
        self.t_indptr = staged.t_indptr;
        Ok(self)
    }
}
