//! Export to dense matrices and to COO/CSR/CSC triples

use crate::array::Array;
use crate::dtype::DType;
use crate::error::{Error, Result};

use super::core::EdgeIndex;

/// Coordinate-format view of an index: aligned row, col, and value buffers
#[derive(Debug, Clone)]
pub struct CooData {
    row: Array,
    col: Array,
    value: Option<Array>,
    size: (usize, usize),
}

impl CooData {
    /// Source coordinates, length `E`
    pub fn row(&self) -> &Array {
        &self.row
    }

    /// Destination coordinates, length `E`
    pub fn col(&self) -> &Array {
        &self.col
    }

    /// Per-edge values, if any
    pub fn value(&self) -> Option<&Array> {
        self.value.as_ref()
    }

    /// Matrix dimensions
    pub fn size(&self) -> (usize, usize) {
        self.size
    }
}

/// Compressed sparse row view: row pointers plus column indices
#[derive(Debug, Clone)]
pub struct CsrData {
    indptr: Array,
    col: Array,
    value: Option<Array>,
    size: (usize, usize),
}

impl CsrData {
    /// Row pointers, length `num_rows + 1`
    pub fn indptr(&self) -> &Array {
        &self.indptr
    }

    /// Column indices, length `E`
    pub fn col(&self) -> &Array {
        &self.col
    }

    /// Per-edge values, if any
    pub fn value(&self) -> Option<&Array> {
        self.value.as_ref()
    }

    /// Matrix dimensions
    pub fn size(&self) -> (usize, usize) {
        self.size
    }
}

/// Compressed sparse column view: column pointers plus row indices
#[derive(Debug, Clone)]
pub struct CscData {
    indptr: Array,
    row: Array,
    value: Option<Array>,
    size: (usize, usize),
}

impl CscData {
    /// Column pointers, length `num_cols + 1`
    pub fn indptr(&self) -> &Array {
        &self.indptr
    }

    /// Row indices, length `E`
    pub fn row(&self) -> &Array {
        &self.row
    }

    /// Per-edge values, if any
    pub fn value(&self) -> Option<&Array> {
        self.value.as_ref()
    }

    /// Matrix dimensions
    pub fn size(&self) -> (usize, usize) {
        self.size
    }
}

impl EdgeIndex {
    fn check_value(&self, value: Option<&Array>) -> Result<()> {
        if let Some(value) = value {
            if value.ndim() != 1 || value.numel() != self.num_edges() {
                return Err(Error::shape_mismatch(&[self.num_edges()], value.shape()));
            }
        }
        Ok(())
    }

    /// Export as coordinate-format triple
    ///
    /// Works on any index; the coordinate buffers share storage with the
    /// container. Unknown matrix dimensions are inferred first.
    pub fn to_coo(&mut self, value: Option<&Array>) -> Result<CooData> {
        self.check_value(value)?;
        let size = self.get_sparse_size()?;
        Ok(CooData {
            row: self.data.row(0)?,
            col: self.data.row(1)?,
            value: value.cloned(),
            size,
        })
    }

    /// Export as compressed sparse row triple
    ///
    /// Requires a row-sorted index; the row pointers come from the cache
    /// and are computed on first use.
    pub fn to_csr(&mut self, value: Option<&Array>) -> Result<CsrData> {
        self.check_value(value)?;
        if !self.is_sorted_by_row() {
            return Err(Error::InvalidState {
                expected: "an index sorted by row",
            });
        }
        let size = self.get_sparse_size()?;
        Ok(CsrData {
            indptr: self.get_indptr()?,
            col: self.data.row(1)?,
            value: value.cloned(),
            size,
        })
    }

    /// Export as compressed sparse column triple
    ///
    /// Requires a col-sorted index, mirroring [`Self::to_csr`]. A
    /// row-sorted index can be brought into column order first via
    /// [`Self::sort_by`], which reuses the transpose caches.
    pub fn to_csc(&mut self, value: Option<&Array>) -> Result<CscData> {
        self.check_value(value)?;
        if !self.is_sorted_by_col() {
            return Err(Error::InvalidState {
                expected: "an index sorted by col",
            });
        }
        let size = self.get_sparse_size()?;
        Ok(CscData {
            indptr: self.get_indptr()?,
            row: self.data.row(0)?,
            value: value.cloned(),
            size,
        })
    }

    /// Materialize the index as a dense matrix
    ///
    /// Missing entries are zero; edges without an explicit value contribute
    /// one. Duplicate coordinates accumulate rather than overwrite. The
    /// output dtype follows the value array, or `F32` when none is given.
    pub fn to_dense(&mut self, value: Option<&Array>) -> Result<Array> {
        self.check_value(value)?;
        let dtype = match value {
            Some(value) => {
                if !value.dtype().is_float() {
                    return Err(Error::unsupported_dtype(value.dtype(), "to_dense"));
                }
                value.dtype()
            }
            None => DType::default_float(),
        };
        let (num_rows, num_cols) = self.get_sparse_size()?;
        let row = self.row_vec()?;
        let col = self.col_vec()?;
        let vals = match value {
            Some(value) => value.to_f64_vec(),
            None => vec![1.0; self.num_edges()],
        };
        let mut dense = vec![0.0f64; num_rows * num_cols];
        for ((&r, &c), v) in row.iter().zip(col.iter()).zip(vals) {
            if r < 0 || r >= num_rows as i64 {
                return Err(Error::IndexOutOfBounds {
                    index: r.max(0) as usize,
                    size: num_rows,
                });
            }
            if c < 0 || c >= num_cols as i64 {
                return Err(Error::IndexOutOfBounds {
                    index: c.max(0) as usize,
                    size: num_cols,
                });
            }
            dense[r as usize * num_cols + c as usize] += v;
        }
        Array::from_f64_slice(&dense, &[num_rows, num_cols], dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SortOrder;

    fn row_sorted() -> EdgeIndex {
        EdgeIndex::from_slices(&[0, 1, 1, 2], &[1, 0, 2, 1])
            .unwrap()
            .with_sort_order(SortOrder::Row)
    }

    #[test]
    fn test_to_coo() {
        let mut index = row_sorted();
        let coo = index.to_coo(None).unwrap();
        assert_eq!(coo.size(), (3, 3));
        assert_eq!(coo.row().to_vec::<i64>().unwrap(), vec![0, 1, 1, 2]);
        assert_eq!(coo.col().to_vec::<i64>().unwrap(), vec![1, 0, 2, 1]);
        assert!(coo.value().is_none());
        assert!(coo.row().shares_storage(index.as_array()));
    }

    #[test]
    fn test_to_csr() {
        let mut index = row_sorted();
        let value = Array::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4]);
        let csr = index.to_csr(Some(&value)).unwrap();
        assert_eq!(csr.indptr().to_vec::<i64>().unwrap(), vec![0, 1, 3, 4]);
        assert_eq!(csr.col().to_vec::<i64>().unwrap(), vec![1, 0, 2, 1]);
        assert_eq!(
            csr.value().unwrap().to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_to_csr_requires_row_order() {
        let mut index = EdgeIndex::from_slices(&[1, 0], &[0, 1]).unwrap();
        assert!(matches!(
            index.to_csr(None),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_to_csc_via_sort() {
        let mut index = row_sorted();
        let (mut col_sorted, _) = index.sort_by(SortOrder::Col).unwrap();
        let csc = col_sorted.to_csc(None).unwrap();
        assert_eq!(csc.indptr().to_vec::<i64>().unwrap(), vec![0, 1, 3, 4]);
        assert_eq!(csc.row().to_vec::<i64>().unwrap(), vec![1, 0, 2, 1]);

        assert!(matches!(
            index.to_csc(None),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_to_dense_default_values() {
        let mut index = row_sorted();
        let dense = index.to_dense(None).unwrap();
        assert_eq!(dense.dtype(), DType::F32);
        assert_eq!(dense.shape(), &[3, 3]);
        assert_eq!(
            dense.to_vec::<f32>().unwrap(),
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_to_dense_accumulates_duplicates() {
        let mut index = EdgeIndex::from_slices(&[0, 0, 1], &[1, 1, 0])
            .unwrap()
            .with_sparse_size(Some(2), Some(2));
        let value = Array::from_slice(&[1.0f64, 2.0, 5.0], &[3]);
        let dense = index.to_dense(Some(&value)).unwrap();
        assert_eq!(dense.dtype(), DType::F64);
        assert_eq!(dense.to_vec::<f64>().unwrap(), vec![0.0, 3.0, 5.0, 0.0]);
    }

    #[test]
    fn test_value_shape_checked() {
        let mut index = row_sorted();
        let bad = Array::from_slice(&[1.0f32, 2.0], &[2]);
        assert!(index.to_coo(Some(&bad)).is_err());
        assert!(index.to_dense(Some(&bad)).is_err());
    }
}
