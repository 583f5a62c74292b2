//! Host kernels for the sparse-dense product
//!
//! Both kernels work on plain host buffers: `i64` coordinates and typed
//! value/feature slices. For min/max reductions they additionally report
//! the winning edge per output element, which the backward pass routes
//! gradients through. Winning edges are reported in the caller's edge
//! numbering via the optional `edge_ids` mapping, so a kernel running over
//! a permuted ordering still yields original edge ids.

use crate::dtype::Element;

use super::ReduceOp;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One output row of the grouped kernel
///
/// Returns the accumulated row and, for min/max, the winner per feature
/// (`-1` when no edge touches the element).
fn grouped_row<T: Element>(
    r: usize,
    indptr: &[i64],
    src: &[i64],
    value: Option<&[T]>,
    edge_ids: Option<&[i64]>,
    x: &[T],
    k: usize,
    reduce: ReduceOp,
) -> (Vec<T>, Vec<i64>) {
    let start = indptr[r] as usize;
    let end = indptr[r + 1] as usize;
    match reduce {
        ReduceOp::Sum | ReduceOp::Mean => {
            let mut acc = vec![T::zero(); k];
            for pos in start..end {
                let v = value.map_or_else(T::one, |v| v[pos]);
                let base = src[pos] as usize * k;
                for (j, slot) in acc.iter_mut().enumerate() {
                    *slot = *slot + v * x[base + j];
                }
            }
            if reduce == ReduceOp::Mean && end > start {
                let count = T::from_f64((end - start) as f64);
                for slot in acc.iter_mut() {
                    *slot = *slot / count;
                }
            }
            (acc, Vec::new())
        }
        ReduceOp::Min | ReduceOp::Max => {
            let mut best = vec![T::zero(); k];
            let mut winner = vec![-1i64; k];
            for pos in start..end {
                let v = value.map_or_else(T::one, |v| v[pos]);
                let id = edge_ids.map_or(pos as i64, |ids| ids[pos]);
                let base = src[pos] as usize * k;
                for j in 0..k {
                    let candidate = v * x[base + j];
                    let better = winner[j] < 0
                        || (reduce == ReduceOp::Min && candidate < best[j])
                        || (reduce == ReduceOp::Max && candidate > best[j]);
                    if better {
                        best[j] = candidate;
                        winner[j] = id;
                    }
                }
            }
            (best, winner)
        }
    }
}

/// Grouped sparse-dense product over compressed pointers
///
/// `indptr` has length `n_out + 1` and groups the edges by output element;
/// `src` and `value` follow the grouped edge order. Rows are independent
/// and computed in parallel when the `rayon` feature is on.
pub(crate) fn spmm_grouped<T: Element>(
    indptr: &[i64],
    src: &[i64],
    value: Option<&[T]>,
    edge_ids: Option<&[i64]>,
    x: &[T],
    k: usize,
    reduce: ReduceOp,
) -> (Vec<T>, Option<Vec<i64>>) {
    let n_out = indptr.len() - 1;

    #[cfg(feature = "rayon")]
    let rows: Vec<(Vec<T>, Vec<i64>)> = (0..n_out)
        .into_par_iter()
        .map(|r| grouped_row(r, indptr, src, value, edge_ids, x, k, reduce))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let rows: Vec<(Vec<T>, Vec<i64>)> = (0..n_out)
        .map(|r| grouped_row(r, indptr, src, value, edge_ids, x, k, reduce))
        .collect();

    let mut out = Vec::with_capacity(n_out * k);
    let mut winners = Vec::new();
    let track_winners = matches!(reduce, ReduceOp::Min | ReduceOp::Max);
    if track_winners {
        winners.reserve(n_out * k);
    }
    for (row, winner) in rows {
        out.extend(row);
        winners.extend(winner);
    }
    (out, track_winners.then_some(winners))
}

/// Edge-order scatter into the output, for unsorted indices
pub(crate) fn spmm_scatter<T: Element>(
    group: &[i64],
    src: &[i64],
    value: Option<&[T]>,
    x: &[T],
    n_out: usize,
    k: usize,
    reduce: ReduceOp,
) -> (Vec<T>, Option<Vec<i64>>) {
    let mut out = vec![T::zero(); n_out * k];
    match reduce {
        ReduceOp::Sum | ReduceOp::Mean => {
            let mut counts = vec![0i64; n_out];
            for (e, (&g, &s)) in group.iter().zip(src.iter()).enumerate() {
                let v = value.map_or_else(T::one, |v| v[e]);
                let (out_base, x_base) = (g as usize * k, s as usize * k);
                for j in 0..k {
                    out[out_base + j] = out[out_base + j] + v * x[x_base + j];
                }
                counts[g as usize] += 1;
            }
            if reduce == ReduceOp::Mean {
                for (g, &count) in counts.iter().enumerate() {
                    if count > 0 {
                        let count = T::from_f64(count as f64);
                        for j in 0..k {
                            out[g * k + j] = out[g * k + j] / count;
                        }
                    }
                }
            }
            (out, None)
        }
        ReduceOp::Min | ReduceOp::Max => {
            let mut winners = vec![-1i64; n_out * k];
            for (e, (&g, &s)) in group.iter().zip(src.iter()).enumerate() {
                let v = value.map_or_else(T::one, |v| v[e]);
                let (out_base, x_base) = (g as usize * k, s as usize * k);
                for j in 0..k {
                    let candidate = v * x[x_base + j];
                    let slot = out_base + j;
                    let better = winners[slot] < 0
                        || (reduce == ReduceOp::Min && candidate < out[slot])
                        || (reduce == ReduceOp::Max && candidate > out[slot]);
                    if better {
                        out[slot] = candidate;
                        winners[slot] = e as i64;
                    }
                }
            }
            (out, Some(winners))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // edges (0,1), (1,0), (1,2), (2,1), grouped by row
    const INDPTR: [i64; 4] = [0, 1, 3, 4];
    const SRC: [i64; 4] = [1, 0, 2, 1];
    const X: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

    #[test]
    fn test_grouped_sum() {
        let (out, winners) =
            spmm_grouped::<f64>(&INDPTR, &SRC, None, None, &X, 2, ReduceOp::Sum);
        assert_eq!(out, vec![3.0, 4.0, 6.0, 8.0, 3.0, 4.0]);
        assert!(winners.is_none());
    }

    #[test]
    fn test_grouped_min_winners() {
        let (out, winners) =
            spmm_grouped::<f64>(&INDPTR, &SRC, None, None, &X, 2, ReduceOp::Min);
        assert_eq!(out, vec![3.0, 4.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(winners.unwrap(), vec![0, 0, 1, 1, 3, 3]);
    }

    #[test]
    fn test_grouped_winners_use_edge_ids() {
        let ids = [10i64, 11, 12, 13];
        let (_, winners) =
            spmm_grouped::<f64>(&INDPTR, &SRC, None, Some(&ids), &X, 2, ReduceOp::Max);
        assert_eq!(winners.unwrap(), vec![10, 10, 12, 12, 13, 13]);
    }

    #[test]
    fn test_scatter_matches_grouped() {
        let group = [0i64, 1, 1, 2];
        let (scattered, _) =
            spmm_scatter::<f64>(&group, &SRC, None, &X, 3, 2, ReduceOp::Sum);
        let (grouped, _) = spmm_grouped::<f64>(&INDPTR, &SRC, None, None, &X, 2, ReduceOp::Sum);
        assert_eq!(scattered, grouped);
    }

    #[test]
    fn test_scatter_mean_empty_group() {
        let group = [0i64, 0];
        let src = [0i64, 1];
        let x = [2.0f64, 4.0, 6.0, 8.0];
        let (out, _) = spmm_scatter::<f64>(&group, &src, None, &x, 2, 2, ReduceOp::Mean);
        assert_eq!(out, vec![4.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_values_respected_by_max() {
        let value = [-1.0f64, -1.0, -1.0, -1.0];
        let (out, _) =
            spmm_grouped::<f64>(&INDPTR, &SRC, Some(&value), None, &X, 2, ReduceOp::Max);
        assert_eq!(out, vec![-3.0, -4.0, -1.0, -2.0, -3.0, -4.0]);
    }
}
