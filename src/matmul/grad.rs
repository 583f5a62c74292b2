//! Backward pass for the sparse-dense product

use crate::array::Array;
use crate::dispatch_float_dtype;
use crate::error::{Error, Result};

use super::ReduceOp;

/// Everything saved by the forward pass to compute gradients
///
/// Coordinates are stored in the orientation the product ran in: `group`
/// is the output-axis coordinate per edge and `src` the input-axis one,
/// so a transposed product needs no special casing here. For mean the
/// per-group edge counts are kept; for min/max the winning edge per
/// output element.
#[derive(Debug)]
pub struct MatmulCtx {
    group: Vec<i64>,
    src: Vec<i64>,
    value: Option<Array>,
    x: Array,
    reduce: ReduceOp,
    n_out: usize,
    n_in: usize,
    k: usize,
    counts: Option<Vec<i64>>,
    winners: Option<Vec<i64>>,
}

impl MatmulCtx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        group: Vec<i64>,
        src: Vec<i64>,
        value: Option<Array>,
        x: Array,
        reduce: ReduceOp,
        n_out: usize,
        n_in: usize,
        k: usize,
        counts: Option<Vec<i64>>,
        winners: Option<Vec<i64>>,
    ) -> Self {
        Self {
            group,
            src,
            value,
            x,
            reduce,
            n_out,
            n_in,
            k,
            counts,
            winners,
        }
    }

    /// The reduction the forward pass ran with
    pub fn reduce(&self) -> ReduceOp {
        self.reduce
    }

    /// Shape of the forward output
    ///
    /// A vector for a vector dense input, otherwise `[n_out, k]`.
    pub fn output_shape(&self) -> Vec<usize> {
        if self.x.ndim() == 1 {
            vec![self.n_out]
        } else {
            vec![self.n_out, self.k]
        }
    }

    /// Propagate an output gradient back to the dense input and the values
    ///
    /// `grad` must have the forward output's shape and dtype. Returns the
    /// gradient with respect to the dense input (shape of `x`) and with
    /// respect to the per-edge values (length `E`), each only when
    /// requested. The input gradient exists for every reduction; the value
    /// gradient only for sum, other reductions report `NotImplemented`.
    pub fn backward(
        &self,
        grad: &Array,
        need_input_grad: bool,
        need_value_grad: bool,
    ) -> Result<(Option<Array>, Option<Array>)> {
        let expected = self.output_shape();
        if grad.shape() != expected.as_slice() {
            return Err(Error::shape_mismatch(&expected, grad.shape()));
        }
        if grad.dtype() != self.x.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: grad.dtype(),
                rhs: self.x.dtype(),
            });
        }
        if need_value_grad && self.reduce != ReduceOp::Sum {
            return Err(Error::NotImplemented {
                feature: "value gradient for mean/min/max reduction",
            });
        }
        if !need_input_grad && !need_value_grad {
            return Ok((None, None));
        }

        dispatch_float_dtype!(grad.dtype(), T => {
            let grad_host = grad.to_vec::<T>()?;
            let value_host = match &self.value {
                Some(value) => Some(value.to_vec::<T>()?),
                None => None,
            };

            let input_grad = if need_input_grad {
                Some(self.input_grad::<T>(&grad_host, value_host.as_deref())?)
            } else {
                None
            };
            let value_grad = if need_value_grad {
                Some(self.value_grad::<T>(&grad_host)?)
            } else {
                None
            };
            Ok((input_grad, value_grad))
        }, "MatmulCtx::backward")
    }

    /// Gradient with respect to the dense input, `A^T`-scatter of `grad`
    fn input_grad<T: crate::dtype::Element>(
        &self,
        grad: &[T],
        value: Option<&[T]>,
    ) -> Result<Array> {
        let k = self.k;
        let mut out = vec![T::zero(); self.n_in * k];
        match self.reduce {
            ReduceOp::Sum => {
                for (e, (&g, &s)) in self.group.iter().zip(self.src.iter()).enumerate() {
                    let v = value.map_or_else(T::one, |v| v[e]);
                    let (out_base, grad_base) = (s as usize * k, g as usize * k);
                    for j in 0..k {
                        out[out_base + j] = out[out_base + j] + v * grad[grad_base + j];
                    }
                }
            }
            ReduceOp::Mean => {
                let counts = self.counts.as_ref().ok_or(Error::InvalidState {
                    expected: "group counts saved by a mean-reduce forward pass",
                })?;
                for (e, (&g, &s)) in self.group.iter().zip(self.src.iter()).enumerate() {
                    let v = value.map_or_else(T::one, |v| v[e]);
                    let count = T::from_f64(counts[g as usize] as f64);
                    let (out_base, grad_base) = (s as usize * k, g as usize * k);
                    for j in 0..k {
                        out[out_base + j] = out[out_base + j] + v * grad[grad_base + j] / count;
                    }
                }
            }
            ReduceOp::Min | ReduceOp::Max => {
                let winners = self.winners.as_ref().ok_or(Error::InvalidState {
                    expected: "winning edges saved by a min/max-reduce forward pass",
                })?;
                for (slot, &e) in winners.iter().enumerate() {
                    if e < 0 {
                        continue;
                    }
                    let v = value.map_or_else(T::one, |v| v[e as usize]);
                    let j = slot % k;
                    let s = self.src[e as usize] as usize;
                    out[s * k + j] = out[s * k + j] + v * grad[slot];
                }
            }
        }
        Array::try_from_slice(&out, self.x.shape())
    }

    /// Gradient with respect to the per-edge values (sum reduction)
    ///
    /// `d out / d value[e]` is the dot product of the gradient row the edge
    /// feeds and the input row it reads.
    fn value_grad<T: crate::dtype::Element>(&self, grad: &[T]) -> Result<Array> {
        let k = self.k;
        let x = self.x.to_vec::<T>()?;
        let mut out = Vec::with_capacity(self.group.len());
        for (&g, &s) in self.group.iter().zip(self.src.iter()) {
            let (grad_base, x_base) = (g as usize * k, s as usize * k);
            let mut acc = T::zero();
            for j in 0..k {
                acc = acc + x[x_base + j] * grad[grad_base + j];
            }
            out.push(acc);
        }
        Array::try_from_slice(&out, &[self.group.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{EdgeIndex, SortOrder};
    use crate::matmul::matmul_with_grad;

    fn row_sorted() -> EdgeIndex {
        EdgeIndex::from_slices(&[0, 1, 1, 2], &[1, 0, 2, 1])
            .unwrap()
            .with_sort_order(SortOrder::Row)
    }

    fn x2() -> Array {
        Array::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2])
    }

    fn ones_grad() -> Array {
        Array::from_slice(&[1.0f32; 6], &[3, 2])
    }

    #[test]
    fn test_sum_input_grad_is_transpose_product() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Sum, false).unwrap();
        let (input_grad, value_grad) = ctx.backward(&ones_grad(), true, false).unwrap();
        assert!(value_grad.is_none());
        // column sums of A: node 1 feeds rows 0 and 2
        assert_eq!(
            input_grad.unwrap().to_vec::<f32>().unwrap(),
            vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_sum_value_grad_is_dot_product() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Sum, false).unwrap();
        let (_, value_grad) = ctx.backward(&ones_grad(), false, true).unwrap();
        // edge e contributes x[col[e]] . grad[row[e]]
        assert_eq!(
            value_grad.unwrap().to_vec::<f32>().unwrap(),
            vec![7.0, 3.0, 11.0, 7.0]
        );
    }

    #[test]
    fn test_mean_input_grad_scales_by_count() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Mean, false).unwrap();
        let (input_grad, _) = ctx.backward(&ones_grad(), true, false).unwrap();
        // edges into output row 1 are averaged over 2
        assert_eq!(
            input_grad.unwrap().to_vec::<f32>().unwrap(),
            vec![0.5, 0.5, 2.0, 2.0, 0.5, 0.5]
        );
    }

    #[test]
    fn test_max_input_grad_routes_to_winners() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Max, false).unwrap();
        let (input_grad, _) = ctx.backward(&ones_grad(), true, false).unwrap();
        // output row 1 picks node 2's features, nodes 1 picked twice elsewhere
        assert_eq!(
            input_grad.unwrap().to_vec::<f32>().unwrap(),
            vec![0.0, 0.0, 2.0, 2.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_value_grad_unsupported_for_max() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Max, false).unwrap();
        assert!(matches!(
            ctx.backward(&ones_grad(), true, true),
            Err(Error::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_backward_checks_grad_shape() {
        let mut index = row_sorted();
        let (_, ctx) = matmul_with_grad(&mut index, None, &x2(), ReduceOp::Sum, false).unwrap();
        let bad = Array::from_slice(&[1.0f32; 4], &[2, 2]);
        assert!(ctx.backward(&bad, true, false).is_err());
    }

    #[test]
    fn test_vector_rhs_grads() {
        let mut index = row_sorted();
        let x = Array::from_slice(&[1.0f32, 2.0, 3.0], &[3]);
        let (out, ctx) = matmul_with_grad(&mut index, None, &x, ReduceOp::Sum, false).unwrap();
        assert_eq!(out.shape(), &[3]);
        let grad = Array::from_slice(&[1.0f32, 1.0, 1.0], &[3]);
        let (input_grad, value_grad) = ctx.backward(&grad, true, true).unwrap();
        let input_grad = input_grad.unwrap();
        assert_eq!(input_grad.shape(), &[3]);
        // each node receives one unit per outgoing edge
        assert_eq!(input_grad.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 1.0]);
        assert_eq!(
            value_grad.unwrap().to_vec::<f32>().unwrap(),
            vec![2.0, 1.0, 3.0, 2.0]
        );
    }

    #[test]
    fn test_transpose_grad_orientation() {
        let mut index = EdgeIndex::from_slices(&[0, 0], &[0, 1])
            .unwrap()
            .with_sort_order(SortOrder::Row)
            .with_sparse_size(Some(1), Some(2));
        let x = Array::from_slice(&[2.0f32, 3.0], &[1, 2]);
        let (out, ctx) = matmul_with_grad(&mut index, None, &x, ReduceOp::Sum, true).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![2.0, 3.0, 2.0, 3.0]);
        let grad = Array::from_slice(&[1.0f32, 1.0, 1.0, 1.0], &[2, 2]);
        let (input_grad, _) = ctx.backward(&grad, true, false).unwrap();
        assert_eq!(input_grad.unwrap().to_vec::<f32>().unwrap(), vec![2.0, 2.0]);
    }
}
