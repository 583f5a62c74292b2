//! Sparse-dense and sparse-sparse matrix multiplication
//!
//! The index acts as the sparse operand: entry `(row[e], col[e])` carries
//! `value[e]`, or an implicit one when no value array is given. Two
//! execution strategies exist for the sparse-dense product:
//!
//! - **Grouped**: walks the compressed pointers of the output axis and
//!   accumulates each output row independently. Requires a sorted index;
//!   a transposed product on an index sorted by the other axis runs over
//!   the cached transposed ordering instead of falling back.
//! - **Scatter**: iterates edges in storage order and scatters into the
//!   output. Works on any index.
//!
//! [`matmul_with_grad`] additionally returns a [`MatmulCtx`] holding what
//! the backward pass needs: coordinates, saved operands, per-group counts
//! for mean, and the winning edge per output element for min/max.

mod grad;
mod kernels;
mod spspmm;

pub use grad::MatmulCtx;
pub use spspmm::spspmm;

use crate::array::Array;
use crate::dispatch_float_dtype;
use crate::error::{Error, Result};
use crate::index::{EdgeIndex, SortOrder};

use kernels::{spmm_grouped, spmm_scatter};

/// How multiple edges landing on the same output element combine
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Add contributions
    Sum,
    /// Average contributions by the number of edges in the group
    Mean,
    /// Keep the smallest contribution
    Min,
    /// Keep the largest contribution
    Max,
}

/// Execution strategy for the sparse-dense product
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatmulBackend {
    /// Per-output-row accumulation over compressed pointers
    Grouped,
    /// Edge-order scatter into the output
    Scatter,
}

/// Pick the execution strategy for a product
///
/// Any sorted index takes the grouped path: when the sort matches the
/// output axis the pointers are used directly, otherwise the transpose
/// caches provide the grouped ordering. Unsorted indices scatter.
pub fn select_backend(index: &EdgeIndex, _transpose: bool) -> MatmulBackend {
    if index.is_sorted() {
        MatmulBackend::Grouped
    } else {
        MatmulBackend::Scatter
    }
}

fn check_coords(coords: &[i64], bound: usize) -> Result<()> {
    for &c in coords {
        if c < 0 || c >= bound as i64 {
            return Err(Error::IndexOutOfBounds {
                index: c.max(0) as usize,
                size: bound,
            });
        }
    }
    Ok(())
}

fn group_counts(group: &[i64], n_out: usize) -> Vec<i64> {
    let mut counts = vec![0i64; n_out];
    for &g in group {
        counts[g as usize] += 1;
    }
    counts
}

/// Multiply the sparse operand with a dense matrix
///
/// Computes `A @ x` (or `A^T @ x` with `transpose`), reducing duplicate
/// coordinates with `reduce`. `x` is a float matrix or vector whose first
/// dimension matches the input axis of the product; a vector input yields
/// a vector output. `value`, when given, must be a 1-D array with one
/// entry per edge and the same dtype as `x`. Output elements no edge
/// touches are zero, for every reduction.
pub fn matmul(
    index: &mut EdgeIndex,
    value: Option<&Array>,
    x: &Array,
    reduce: ReduceOp,
    transpose: bool,
) -> Result<Array> {
    matmul_with_grad(index, value, x, reduce, transpose).map(|(out, _)| out)
}

/// Multiply and keep everything the backward pass needs
pub fn matmul_with_grad(
    index: &mut EdgeIndex,
    value: Option<&Array>,
    x: &Array,
    reduce: ReduceOp,
    transpose: bool,
) -> Result<(Array, MatmulCtx)> {
    if !matches!(x.ndim(), 1 | 2) {
        return Err(Error::invalid_argument(
            "x",
            "expected a rank-1 or rank-2 dense operand",
        ));
    }
    if !x.dtype().is_float() {
        return Err(Error::unsupported_dtype(x.dtype(), "matmul"));
    }
    if let Some(value) = value {
        if value.ndim() != 1 || value.numel() != index.num_edges() {
            return Err(Error::shape_mismatch(&[index.num_edges()], value.shape()));
        }
        if value.dtype() != x.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: value.dtype(),
                rhs: x.dtype(),
            });
        }
    }

    let (num_rows, num_cols) = index.get_sparse_size()?;
    let (n_out, n_in, group_axis) = if transpose {
        (num_cols, num_rows, SortOrder::Col)
    } else {
        (num_rows, num_cols, SortOrder::Row)
    };
    if x.shape()[0] != n_in {
        return Err(Error::shape_mismatch(&[n_in], &x.shape()[..1]));
    }
    let vector_rhs = x.ndim() == 1;
    let k = if vector_rhs { 1 } else { x.shape()[1] };

    let group = index.axis_vec(group_axis)?;
    let src = index.axis_vec(group_axis.opposite())?;
    check_coords(&group, n_out)?;
    check_coords(&src, n_in)?;

    dispatch_float_dtype!(x.dtype(), T => {
        let x_host = x.to_vec::<T>()?;
        let value_host = value.map(|v| v.to_vec::<T>()).transpose()?;

        let (out_host, winners) = match select_backend(index, transpose) {
            MatmulBackend::Grouped if index.sort_order() == Some(group_axis) => {
                let indptr = index.get_indptr()?.to_i64_vec()?;
                spmm_grouped(&indptr, &src, value_host.as_deref(), None, &x_host, k, reduce)
            }
            MatmulBackend::Grouped => {
                let indptr = index.get_t_indptr()?.to_i64_vec()?;
                let perm = index.get_t_perm()?.to_i64_vec()?;
                let src_t: Vec<i64> = perm.iter().map(|&e| src[e as usize]).collect();
                let value_t: Option<Vec<T>> = value_host
                    .as_ref()
                    .map(|v| perm.iter().map(|&e| v[e as usize]).collect());
                spmm_grouped(
                    &indptr,
                    &src_t,
                    value_t.as_deref(),
                    Some(&perm),
                    &x_host,
                    k,
                    reduce,
                )
            }
            MatmulBackend::Scatter => {
                spmm_scatter(&group, &src, value_host.as_deref(), &x_host, n_out, k, reduce)
            }
        };

        let out = if vector_rhs {
            Array::try_from_slice(&out_host, &[n_out])?
        } else {
            Array::try_from_slice(&out_host, &[n_out, k])?
        };
        let counts = (reduce == ReduceOp::Mean).then(|| group_counts(&group, n_out));
        let ctx = MatmulCtx::new(
            group,
            src,
            value.cloned(),
            x.clone(),
            reduce,
            n_out,
            n_in,
            k,
            counts,
            winners,
        );
        Ok((out, ctx))
    }, "matmul")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_sorted() -> EdgeIndex {
        EdgeIndex::from_slices(&[0, 1, 1, 2], &[1, 0, 2, 1])
            .unwrap()
            .with_sort_order(SortOrder::Row)
    }

    fn x2() -> Array {
        Array::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2])
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(select_backend(&row_sorted(), false), MatmulBackend::Grouped);
        assert_eq!(select_backend(&row_sorted(), true), MatmulBackend::Grouped);
        let unsorted = EdgeIndex::from_slices(&[1, 0], &[0, 1]).unwrap();
        assert_eq!(select_backend(&unsorted, false), MatmulBackend::Scatter);
    }

    #[test]
    fn test_matmul_sum_grouped() {
        let mut index = row_sorted();
        let out = matmul(&mut index, None, &x2(), ReduceOp::Sum, false).unwrap();
        assert_eq!(out.shape(), &[3, 2]);
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 6.0, 8.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_matmul_sum_scatter_matches_grouped() {
        let mut unsorted = EdgeIndex::from_slices(&[1, 0, 2, 1], &[2, 1, 1, 0])
            .unwrap()
            .with_sparse_size(Some(3), Some(3));
        let scattered = matmul(&mut unsorted, None, &x2(), ReduceOp::Sum, false).unwrap();
        let (mut sorted, _) = unsorted.sort_by(SortOrder::Row).unwrap();
        let grouped = matmul(&mut sorted, None, &x2(), ReduceOp::Sum, false).unwrap();
        assert_eq!(scattered, grouped);
    }

    #[test]
    fn test_matmul_with_values() {
        let mut index = row_sorted();
        let value = Array::from_slice(&[1.0f32, 2.0, 0.5, 3.0], &[4]);
        let out = matmul(&mut index, Some(&value), &x2(), ReduceOp::Sum, false).unwrap();
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 4.5, 7.0, 9.0, 12.0]
        );
    }

    #[test]
    fn test_matmul_transpose_uses_caches() {
        let mut index = row_sorted();
        index.fill_cache_().unwrap();
        let out = matmul(&mut index, None, &x2(), ReduceOp::Sum, true).unwrap();
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 6.0, 8.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_matmul_vector_rhs() {
        let mut index = row_sorted();
        let x = Array::from_slice(&[1.0f32, 2.0, 3.0], &[3]);
        let out = matmul(&mut index, None, &x, ReduceOp::Sum, false).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![2.0, 4.0, 2.0]);
    }

    #[test]
    fn test_matmul_mean() {
        let mut index = row_sorted();
        let out = matmul(&mut index, None, &x2(), ReduceOp::Mean, false).unwrap();
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 3.0, 4.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_matmul_min_max() {
        let mut index = row_sorted();
        let min = matmul(&mut index, None, &x2(), ReduceOp::Min, false).unwrap();
        assert_eq!(
            min.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 1.0, 2.0, 3.0, 4.0]
        );
        let max = matmul(&mut index, None, &x2(), ReduceOp::Max, false).unwrap();
        assert_eq!(
            max.to_vec::<f32>().unwrap(),
            vec![3.0, 4.0, 5.0, 6.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_matmul_empty_rows_are_zero() {
        let mut index = EdgeIndex::from_slices(&[0], &[0])
            .unwrap()
            .with_sort_order(SortOrder::Row)
            .with_sparse_size(Some(2), Some(1));
        let x = Array::from_slice(&[7.0f32, 8.0], &[1, 2]);
        for reduce in [ReduceOp::Sum, ReduceOp::Mean, ReduceOp::Min, ReduceOp::Max] {
            let out = matmul(&mut index, None, &x, reduce, false).unwrap();
            assert_eq!(out.to_vec::<f32>().unwrap(), vec![7.0, 8.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_matmul_rejects_bad_operands() {
        let mut index = row_sorted();
        let wrong_rows = Array::from_slice(&[1.0f32, 2.0], &[2, 1]);
        assert!(matmul(&mut index, None, &wrong_rows, ReduceOp::Sum, false).is_err());

        let int_x = Array::from_slice(&[1i64, 2, 3], &[3, 1]);
        assert!(matmul(&mut index, None, &int_x, ReduceOp::Sum, false).is_err());

        let value64 = Array::from_slice(&[1.0f64; 4], &[4]);
        assert!(matches!(
            matmul(&mut index, Some(&value64), &x2(), ReduceOp::Sum, false),
            Err(Error::DTypeMismatch { .. })
        ));
    }
}
