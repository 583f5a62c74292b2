//! Sparse-sparse product via row-by-row accumulation

use crate::array::Array;
use crate::dispatch_float_dtype;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::index::{EdgeIndex, SortOrder};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One output row: expand row `i` of `a` through the rows of `b`
///
/// Uses a dense accumulator over the output columns with a touched list,
/// so clearing is proportional to the row's fill-in. Columns come out
/// sorted.
fn product_row<T: Element>(
    i: usize,
    a_indptr: &[i64],
    a_col: &[i64],
    a_val: Option<&[T]>,
    b_indptr: &[i64],
    b_col: &[i64],
    b_val: Option<&[T]>,
    q: usize,
) -> (Vec<i64>, Vec<T>) {
    let mut acc = vec![T::zero(); q];
    let mut seen = vec![false; q];
    let mut touched: Vec<usize> = Vec::new();
    for pos_a in a_indptr[i] as usize..a_indptr[i + 1] as usize {
        let inner = a_col[pos_a] as usize;
        let va = a_val.map_or_else(T::one, |v| v[pos_a]);
        for pos_b in b_indptr[inner] as usize..b_indptr[inner + 1] as usize {
            let c = b_col[pos_b] as usize;
            let vb = b_val.map_or_else(T::one, |v| v[pos_b]);
            if !seen[c] {
                seen[c] = true;
                touched.push(c);
            }
            acc[c] = acc[c] + va * vb;
        }
    }
    touched.sort_unstable();
    let vals = touched.iter().map(|&c| acc[c]).collect();
    let cols = touched.into_iter().map(|c| c as i64).collect();
    (cols, vals)
}

/// Multiply two sparse operands
///
/// Both indices must be sorted by row; their compressed pointers drive the
/// expansion and are computed on first use. The declared or inferred inner
/// dimensions must agree. The result is row-sorted with columns ascending
/// within each row, duplicates merged, and its row pointers prefilled.
///
/// Values follow the operands: when at least one side carries values the
/// result does too (the other side contributing implicit ones); when
/// neither does, only the product structure is returned.
pub fn spspmm(
    a: &mut EdgeIndex,
    a_value: Option<&Array>,
    b: &mut EdgeIndex,
    b_value: Option<&Array>,
) -> Result<(EdgeIndex, Option<Array>)> {
    for index in [&*a, &*b] {
        if !index.is_sorted_by_row() {
            return Err(Error::InvalidState {
                expected: "an index sorted by row",
            });
        }
    }
    for (index, value) in [(&*a, a_value), (&*b, b_value)] {
        if let Some(value) = value {
            if value.ndim() != 1 || value.numel() != index.num_edges() {
                return Err(Error::shape_mismatch(&[index.num_edges()], value.shape()));
            }
            if !value.dtype().is_float() {
                return Err(Error::unsupported_dtype(value.dtype(), "spspmm"));
            }
        }
    }
    let value_dtype = match (a_value, b_value) {
        (Some(av), Some(bv)) => {
            if av.dtype() != bv.dtype() {
                return Err(Error::DTypeMismatch {
                    lhs: av.dtype(),
                    rhs: bv.dtype(),
                });
            }
            Some(av.dtype())
        }
        (Some(av), None) => Some(av.dtype()),
        (None, Some(bv)) => Some(bv.dtype()),
        (None, None) => None,
    };

    let (m, p_a) = a.get_sparse_size()?;
    let (p_b, q) = b.get_sparse_size()?;
    if p_a != p_b {
        return Err(Error::shape_mismatch(&[m, p_a], &[p_b, q]));
    }

    let a_indptr = a.get_indptr()?.to_i64_vec()?;
    let a_col = a.col_vec()?;
    let b_indptr = b.get_indptr()?.to_i64_vec()?;
    let b_col = b.col_vec()?;
    super::check_coords(&a_col, p_a)?;
    super::check_coords(&b_col, q)?;

    let coord_dtype = if a.dtype().size_in_bytes() >= b.dtype().size_in_bytes() {
        a.dtype()
    } else {
        b.dtype()
    };

    dispatch_float_dtype!(value_dtype.unwrap_or(DType::F64), T => {
        let a_val = a_value.map(|v| v.to_vec::<T>()).transpose()?;
        let b_val = b_value.map(|v| v.to_vec::<T>()).transpose()?;

        let row_job = |i: usize| {
            product_row(
                i,
                &a_indptr,
                &a_col,
                a_val.as_deref(),
                &b_indptr,
                &b_col,
                b_val.as_deref(),
                q,
            )
        };
        #[cfg(feature = "rayon")]
        let rows: Vec<(Vec<i64>, Vec<T>)> = (0..m).into_par_iter().map(row_job).collect();
        #[cfg(not(feature = "rayon"))]
        let rows: Vec<(Vec<i64>, Vec<T>)> = (0..m).map(row_job).collect();

        let nnz: usize = rows.iter().map(|(cols, _)| cols.len()).sum();
        let mut indptr = Vec::with_capacity(m + 1);
        let mut row_coords = Vec::with_capacity(nnz);
        let mut col_coords = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        indptr.push(0i64);
        for (i, (cols, vals)) in rows.into_iter().enumerate() {
            row_coords.resize(row_coords.len() + cols.len(), i as i64);
            col_coords.extend(cols);
            values.extend(vals);
            indptr.push(col_coords.len() as i64);
        }

        let mut host = Vec::with_capacity(2 * nnz);
        host.extend_from_slice(&row_coords);
        host.extend_from_slice(&col_coords);
        let data = Array::from_i64_slice(&host, &[2, nnz], coord_dtype)?;
        let mut out = EdgeIndex::new(data)?
            .with_sparse_size(Some(m), Some(q))
            .with_sort_order(SortOrder::Row);
        out.indptr = Some(Array::try_from_slice(&indptr, &[m + 1])?);

        let out_value = match value_dtype {
            Some(_) => Some(Array::try_from_slice(&values, &[nnz])?),
            None => None,
        };
        Ok((out, out_value))
    }, "spspmm")
}
