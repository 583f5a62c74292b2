//! Core container: construction, metadata, validation

use crate::array::Array;
use crate::dtype::DType;
use crate::error::{Error, Result};

/// The coordinate axis an index is sorted by
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    /// Sorted by source coordinate (first coordinate row)
    Row,
    /// Sorted by destination coordinate (second coordinate row)
    Col,
}

impl SortOrder {
    /// The other axis
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Self::Row => Self::Col,
            Self::Col => Self::Row,
        }
    }
}

/// A sparse adjacency index over a `2 x E` coordinate array
///
/// Row 0 holds source coordinates, row 1 destination coordinates. Alongside
/// the raw coordinates the container tracks what it knows about itself:
/// the size of the underlying sparse matrix, whether the edges are sorted
/// by row or column, and whether the graph is undirected. Derived
/// structures (compressed pointers, the transpose permutation and the
/// transposed coordinates) are computed lazily and cached; transforms
/// propagate metadata and caches wherever the result provably preserves
/// them, and drop them otherwise.
#[derive(Debug, Clone)]
pub struct EdgeIndex {
    /// Coordinate array, shape `[2, E]`, integer dtype
    pub(crate) data: Array,
    /// Known number of rows / columns of the underlying matrix
    pub(crate) sparse_size: (Option<usize>, Option<usize>),
    /// Claimed sort order of the edges
    pub(crate) sort_order: Option<SortOrder>,
    /// Whether the edge set is symmetric
    pub(crate) is_undirected: bool,
    /// Compressed pointers over the sorted axis (`I64`, length `n + 1`)
    pub(crate) indptr: Option<Array>,
    /// Stable permutation into the opposite sort order (`I64`, length `E`)
    pub(crate) t_perm: Option<Array>,
    /// Coordinates permuted by `t_perm` (`[2, E]`, same dtype as `data`)
    pub(crate) t_index: Option<Array>,
    /// Compressed pointers of the transposed ordering
    pub(crate) t_indptr: Option<Array>,
}

impl EdgeIndex {
    /// Wrap a coordinate array
    ///
    /// The array must have shape `[2, E]`, an integer dtype, and contiguous
    /// storage; no silent copy is made. No metadata is assumed; use the
    /// builder methods to declare what is known, and [`Self::validate`] to
    /// check declarations against the data.
    pub fn new(data: Array) -> Result<Self> {
        if !data.dtype().is_int() {
            return Err(Error::unsupported_dtype(data.dtype(), "EdgeIndex::new"));
        }
        if data.ndim() != 2 || data.shape()[0] != 2 {
            return Err(Error::ShapeMismatch {
                expected: vec![2, data.shape().last().copied().unwrap_or(0)],
                got: data.shape().to_vec(),
            });
        }
        if !data.is_contiguous() {
            return Err(Error::NotContiguous);
        }
        Ok(Self {
            data,
            sparse_size: (None, None),
            sort_order: None,
            is_undirected: false,
            indptr: None,
            t_perm: None,
            t_index: None,
            t_indptr: None,
        })
    }

    /// Wrap a coordinate array and declare all metadata at once
    pub fn with_options(
        data: Array,
        sparse_size: (Option<usize>, Option<usize>),
        sort_order: Option<SortOrder>,
        is_undirected: bool,
    ) -> Result<Self> {
        let mut index = Self::new(data)?;
        index.sparse_size = sparse_size;
        index.sort_order = sort_order;
        index.is_undirected = is_undirected;
        Ok(index)
    }

    /// Build an `I64` index from separate source and destination slices
    pub fn from_slices(row: &[i64], col: &[i64]) -> Result<Self> {
        if row.len() != col.len() {
            return Err(Error::shape_mismatch(&[row.len()], &[col.len()]));
        }
        let mut host = Vec::with_capacity(2 * row.len());
        host.extend_from_slice(row);
        host.extend_from_slice(col);
        Self::new(Array::try_from_slice(&host, &[2, row.len()])?)
    }

    /// Declare the size of the underlying sparse matrix
    pub fn with_sparse_size(mut self, num_rows: Option<usize>, num_cols: Option<usize>) -> Self {
        self.sparse_size = (num_rows, num_cols);
        self
    }

    /// Declare the sort order of the edges
    ///
    /// The claim is trusted; call [`Self::validate`] to verify it.
    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        if self.sort_order != Some(order) {
            self.clear_cache();
        }
        self.sort_order = Some(order);
        self
    }

    /// Declare the edge set symmetric
    pub fn with_undirected(mut self, undirected: bool) -> Self {
        self.is_undirected = undirected;
        self
    }

    /// The underlying coordinate array
    #[inline]
    pub fn as_array(&self) -> &Array {
        &self.data
    }

    /// Element type of the coordinates
    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of edges
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.data.shape()[1]
    }

    /// Declared sparse size, either component may be unknown
    #[inline]
    pub fn sparse_size(&self) -> (Option<usize>, Option<usize>) {
        self.sparse_size
    }

    /// Claimed sort order, if any
    #[inline]
    pub fn sort_order(&self) -> Option<SortOrder> {
        self.sort_order
    }

    /// Whether any sort order is claimed
    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.sort_order.is_some()
    }

    /// Whether the edges are claimed sorted by source coordinate
    #[inline]
    pub fn is_sorted_by_row(&self) -> bool {
        self.sort_order == Some(SortOrder::Row)
    }

    /// Whether the edges are claimed sorted by destination coordinate
    #[inline]
    pub fn is_sorted_by_col(&self) -> bool {
        self.sort_order == Some(SortOrder::Col)
    }

    /// Whether the edge set is declared symmetric
    #[inline]
    pub fn is_undirected(&self) -> bool {
        self.is_undirected
    }

    /// Source coordinates, widened to `i64`
    pub(crate) fn row_vec(&self) -> Result<Vec<i64>> {
        self.data.row(0)?.to_i64_vec()
    }

    /// Destination coordinates, widened to `i64`
    pub(crate) fn col_vec(&self) -> Result<Vec<i64>> {
        self.data.row(1)?.to_i64_vec()
    }

    /// Coordinates of the given axis, widened to `i64`
    pub(crate) fn axis_vec(&self, axis: SortOrder) -> Result<Vec<i64>> {
        match axis {
            SortOrder::Row => self.row_vec(),
            SortOrder::Col => self.col_vec(),
        }
    }

    /// Drop all cached derived structures
    pub(crate) fn clear_cache(&mut self) {
        self.indptr = None;
        self.t_perm = None;
        self.t_index = None;
        self.t_indptr = None;
    }

    /// Number of rows of the underlying matrix, computing it if unknown
    ///
    /// When unknown, the size is inferred as one past the largest observed
    /// coordinate and remembered. An undirected index infers a square size
    /// from both coordinate rows.
    pub fn get_num_rows(&mut self) -> Result<usize> {
        if let Some(n) = self.sparse_size.0 {
            return Ok(n);
        }
        let n = self.infer_size(SortOrder::Row)?;
        self.sparse_size.0 = Some(n);
        if self.is_undirected {
            self.sparse_size.1 = Some(n);
        }
        Ok(n)
    }

    /// Number of columns of the underlying matrix, computing it if unknown
    pub fn get_num_cols(&mut self) -> Result<usize> {
        if let Some(n) = self.sparse_size.1 {
            return Ok(n);
        }
        let n = self.infer_size(SortOrder::Col)?;
        self.sparse_size.1 = Some(n);
        if self.is_undirected {
            self.sparse_size.0 = Some(n);
        }
        Ok(n)
    }

    /// Both matrix dimensions, computing unknown ones
    pub fn get_sparse_size(&mut self) -> Result<(usize, usize)> {
        Ok((self.get_num_rows()?, self.get_num_cols()?))
    }

    fn infer_size(&self, axis: SortOrder) -> Result<usize> {
        let max = if self.is_undirected {
            let row_max = self.row_vec()?.into_iter().max();
            let col_max = self.col_vec()?.into_iter().max();
            row_max.max(col_max)
        } else {
            self.axis_vec(axis)?.into_iter().max()
        };
        Ok(max.map_or(0, |m| (m + 1) as usize))
    }

    /// Whether a pointer array is well formed for the given axis
    ///
    /// A pointer array must have one entry per axis position plus one,
    /// start at zero, end at the edge count, and be non-decreasing.
    pub(crate) fn check_pointer_array(
        &self,
        ptr: &Array,
        axis: SortOrder,
        name: &str,
    ) -> Result<()> {
        let ptr = ptr.to_i64_vec()?;
        let n = match axis {
            SortOrder::Row => self.sparse_size.0,
            SortOrder::Col => self.sparse_size.1,
        }
        .map_or_else(|| self.infer_size(axis), Ok)?;
        let well_formed = ptr.len() == n + 1
            && ptr.first() == Some(&0)
            && ptr.last() == Some(&(self.num_edges() as i64))
            && is_nondecreasing(&ptr);
        if !well_formed {
            return Err(Error::validation(format!(
                "'{}' is a malformed pointer array",
                name
            )));
        }
        Ok(())
    }

    /// Verify every claim the container makes about its data
    ///
    /// Checks that coordinates are non-negative and within the declared
    /// sparse size, that a claimed sort order holds, that cached pointer
    /// arrays are well formed, and that a claimed undirected index is in
    /// fact symmetric.
    pub fn validate(&self) -> Result<&Self> {
        let row = self.row_vec()?;
        let col = self.col_vec()?;
        for (name, coords, bound) in [
            ("row", &row, self.sparse_size.0),
            ("col", &col, self.sparse_size.1),
        ] {
            if let Some(&min) = coords.iter().min() {
                if min < 0 {
                    return Err(Error::validation(format!(
                        "'{}' contains negative coordinate {}",
                        name, min
                    )));
                }
            }
            if let (Some(bound), Some(&max)) = (bound, coords.iter().max()) {
                if max >= bound as i64 {
                    return Err(Error::validation(format!(
                        "'{}' contains coordinate {} outside sparse size {}",
                        name, max, bound
                    )));
                }
            }
        }
        match self.sort_order {
            Some(SortOrder::Row) if !is_nondecreasing(&row) => {
                return Err(Error::validation("claimed row sort order does not hold"));
            }
            Some(SortOrder::Col) if !is_nondecreasing(&col) => {
                return Err(Error::validation("claimed col sort order does not hold"));
            }
            _ => {}
        }
        if let Some(order) = self.sort_order {
            if let Some(indptr) = &self.indptr {
                self.check_pointer_array(indptr, order, "indptr")?;
            }
            if let Some(t_indptr) = &self.t_indptr {
                self.check_pointer_array(t_indptr, order.opposite(), "t_indptr")?;
            }
        }
        if self.is_undirected {
            let mut forward: Vec<(i64, i64)> = row.iter().copied().zip(col.iter().copied()).collect();
            let mut reverse: Vec<(i64, i64)> = col.into_iter().zip(row).collect();
            forward.sort_unstable();
            reverse.sort_unstable();
            if forward != reverse {
                return Err(Error::validation(
                    "claimed undirected index is not symmetric",
                ));
            }
        }
        Ok(self)
    }
}

/// Whether a coordinate sequence is sorted ascending (ties allowed)
pub(crate) fn is_nondecreasing(values: &[i64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> EdgeIndex {
        EdgeIndex::from_slices(&[0, 1, 1, 2], &[1, 0, 2, 1]).unwrap()
    }

    #[test]
    fn test_new_checks_shape_and_dtype() {
        let bad_shape = Array::from_slice(&[0i64, 1, 2], &[3]);
        assert!(EdgeIndex::new(bad_shape).is_err());

        let bad_dtype = Array::from_slice(&[0.0f32, 1.0, 1.0, 0.0], &[2, 2]);
        assert!(EdgeIndex::new(bad_dtype).is_err());

        let view = Array::from_slice(&[0i64, 1, 1, 0], &[2, 2]).t();
        assert!(matches!(
            EdgeIndex::new(view),
            Err(Error::NotContiguous)
        ));
    }

    #[test]
    fn test_with_options() {
        let data = Array::from_slice(&[0i64, 1, 1, 0], &[2, 2]);
        let index =
            EdgeIndex::with_options(data, (Some(2), Some(2)), Some(SortOrder::Row), true)
                .unwrap();
        assert_eq!(index.sparse_size(), (Some(2), Some(2)));
        assert!(index.is_sorted_by_row());
        assert!(index.is_undirected());
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_metadata_defaults() {
        let index = small();
        assert_eq!(index.num_edges(), 4);
        assert_eq!(index.dtype(), DType::I64);
        assert_eq!(index.sparse_size(), (None, None));
        assert!(!index.is_sorted());
        assert!(!index.is_undirected());
    }

    #[test]
    fn test_size_inference() {
        let mut index = small();
        assert_eq!(index.get_num_rows().unwrap(), 3);
        assert_eq!(index.get_num_cols().unwrap(), 3);
        assert_eq!(index.sparse_size(), (Some(3), Some(3)));
    }

    #[test]
    fn test_size_inference_undirected_is_square() {
        let mut index = EdgeIndex::from_slices(&[0, 4], &[4, 0])
            .unwrap()
            .with_undirected(true);
        assert_eq!(index.get_num_rows().unwrap(), 5);
        assert_eq!(index.sparse_size(), (Some(5), Some(5)));
    }

    #[test]
    fn test_validate_accepts_consistent_claims() {
        let index = small()
            .with_sparse_size(Some(3), Some(3))
            .with_sort_order(SortOrder::Row)
            .with_undirected(true);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        let index = small().with_sparse_size(Some(2), None);
        assert!(index.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative() {
        let index = EdgeIndex::from_slices(&[-1, 0], &[0, 1]).unwrap();
        assert!(index.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_false_sort_claim() {
        let index = EdgeIndex::from_slices(&[1, 0], &[0, 1])
            .unwrap()
            .with_sort_order(SortOrder::Row);
        assert!(index.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_indptr() {
        let mut index = small().with_sort_order(SortOrder::Row);
        index.indptr = Some(Array::from_slice(&[0i64, 99, 99, 4], &[4]));
        assert!(index.validate().is_err());

        index.indptr = Some(Array::from_slice(&[0i64, 1, 3], &[3]));
        assert!(index.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_computed_indptr() {
        let mut index = small().with_sort_order(SortOrder::Row);
        index.get_indptr().unwrap();
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_false_undirected_claim() {
        let index = EdgeIndex::from_slices(&[0, 1], &[1, 2])
            .unwrap()
            .with_undirected(true);
        assert!(index.validate().is_err());
    }
}
