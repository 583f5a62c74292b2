//! Minimal dense array: dtype-tagged shared storage plus a layout
//!
//! `Array` is the host-array collaborator the adjacency index is built on.
//! It consists of:
//! - **Storage**: reference-counted immutable buffers (`Arc<[T]>`), tagged
//!   with their runtime dtype
//! - **Layout**: shape, strides, and offset defining the view into storage
//!
//! Views (`t`, `row`) share storage; kernels read data out to host `Vec`s,
//! compute, and materialize results back as fresh arrays. Rank is limited
//! to 1 and 2, all this crate ever needs.

mod layout;

pub use layout::Layout;

use crate::dtype::{DType, Element, IndexElement};
use crate::error::{Error, Result};
use crate::{dispatch_dtype, dispatch_float_dtype, dispatch_int_dtype};
use std::sync::Arc;

/// Dtype-tagged reference-counted storage
#[derive(Debug, Clone)]
enum ArrayData {
    I16(Arc<[i16]>),
    I32(Arc<[i32]>),
    I64(Arc<[i64]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl ArrayData {
    fn dtype(&self) -> DType {
        match self {
            Self::I16(_) => DType::I16,
            Self::I32(_) => DType::I32,
            Self::I64(_) => DType::I64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }
}

/// Read elements in logical order, honoring strides and offset
fn gather<T: Copy>(src: &[T], layout: &Layout) -> Vec<T> {
    let mut out = Vec::with_capacity(layout.numel());
    match *layout.shape() {
        [] => {}
        [n] => {
            for i in 0..n {
                out.push(src[layout.index_of(&[i])]);
            }
        }
        [n, m] => {
            for i in 0..n {
                for j in 0..m {
                    out.push(src[layout.index_of(&[i, j])]);
                }
            }
        }
        _ => unreachable!("rank > 2 is rejected at construction"),
    }
    out
}

/// 1-D or 2-D dense array on shared storage
#[derive(Debug, Clone)]
pub struct Array {
    data: ArrayData,
    layout: Layout,
}

impl Array {
    /// Create an array from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape`
    /// dimensions or if the rank exceeds 2. For a fallible alternative, use
    /// [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Self {
        Self::try_from_slice(data, shape).expect("Array::from_slice failed")
    }

    /// Create an array from a slice of data (fallible version)
    pub fn try_from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        if shape.len() > 2 {
            return Err(Error::invalid_argument(
                "shape",
                format!("rank {} exceeds the supported maximum of 2", shape.len()),
            ));
        }
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        let storage = match T::DTYPE {
            DType::I16 => ArrayData::I16(Arc::from(bytemuck::cast_slice::<T, i16>(data))),
            DType::I32 => ArrayData::I32(Arc::from(bytemuck::cast_slice::<T, i32>(data))),
            DType::I64 => ArrayData::I64(Arc::from(bytemuck::cast_slice::<T, i64>(data))),
            DType::F32 => ArrayData::F32(Arc::from(bytemuck::cast_slice::<T, f32>(data))),
            DType::F64 => ArrayData::F64(Arc::from(bytemuck::cast_slice::<T, f64>(data))),
        };
        Ok(Self {
            data: storage,
            layout: Layout::contiguous(shape),
        })
    }

    /// Materialize an `i64` host buffer in the requested integer dtype
    ///
    /// Narrowing is checked; an out-of-range value is an error.
    pub fn from_i64_slice(data: &[i64], shape: &[usize], dtype: DType) -> Result<Self> {
        dispatch_int_dtype!(dtype, T => {
            let narrowed: Vec<T> = data
                .iter()
                .map(|&v| {
                    <T as IndexElement>::try_from_i64(v).ok_or_else(|| {
                        Error::invalid_argument(
                            "data",
                            format!("value {} out of range for dtype {}", v, dtype),
                        )
                    })
                })
                .collect::<Result<_>>()?;
            Self::try_from_slice(&narrowed, shape)
        }, "Array::from_i64_slice")
    }

    /// Materialize an `f64` host buffer in the requested float dtype
    pub fn from_f64_slice(data: &[f64], shape: &[usize], dtype: DType) -> Result<Self> {
        dispatch_float_dtype!(dtype, T => {
            let narrowed: Vec<T> = data.iter().map(|&v| <T as Element>::from_f64(v)).collect();
            Self::try_from_slice(&narrowed, shape)
        }, "Array::from_f64_slice")
    }

    /// A 1-D `I64` array holding `0..n`
    pub fn arange(n: usize) -> Self {
        let data: Vec<i64> = (0..n as i64).collect();
        Self::from_slice(&data, &[n])
    }

    /// A constant array of ones
    pub fn ones(shape: &[usize], dtype: DType) -> Result<Self> {
        let n: usize = shape.iter().product();
        dispatch_dtype!(dtype, T => {
            let data = vec![<T as Element>::one(); n];
            Self::try_from_slice(&data, shape)
        }, "Array::ones")
    }

    /// Element type of the array
    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Shape of the view
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    /// Strides of the view, in elements
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Whether the view is a dense row-major prefix of its storage
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Transposed view (rank 2); shares storage with `self`
    pub fn t(&self) -> Array {
        Array {
            data: self.data.clone(),
            layout: self.layout.transposed(),
        }
    }

    /// View of row `i` of a rank-2 array; shares storage with `self`
    pub fn row(&self, i: usize) -> Result<Array> {
        let shape = self.shape();
        if shape.len() != 2 {
            return Err(Error::shape_mismatch(&[2], &[shape.len()]));
        }
        if i >= shape[0] {
            return Err(Error::IndexOutOfBounds {
                index: i,
                size: shape[0],
            });
        }
        let strides = self.strides();
        let layout = Layout::new(
            vec![shape[1]],
            vec![strides[1]],
            self.layout.offset() + i * strides[0] as usize,
        );
        Ok(Array {
            data: self.data.clone(),
            layout,
        })
    }

    /// Return a contiguous array with the same logical contents
    ///
    /// Cheap (storage-sharing) when the view is already contiguous.
    pub fn contiguous(&self) -> Array {
        if self.is_contiguous() {
            return self.clone();
        }
        let shape = self.shape().to_vec();
        match &self.data {
            ArrayData::I16(s) => Array::from_slice(&gather(s, &self.layout), &shape),
            ArrayData::I32(s) => Array::from_slice(&gather(s, &self.layout), &shape),
            ArrayData::I64(s) => Array::from_slice(&gather(s, &self.layout), &shape),
            ArrayData::F32(s) => Array::from_slice(&gather(s, &self.layout), &shape),
            ArrayData::F64(s) => Array::from_slice(&gather(s, &self.layout), &shape),
        }
    }

    /// Read the array out to a host `Vec` in logical order
    ///
    /// The requested element type must match the array's dtype exactly.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.dtype(),
            });
        }
        Ok(match &self.data {
            ArrayData::I16(s) => bytemuck::cast_vec(gather(s, &self.layout)),
            ArrayData::I32(s) => bytemuck::cast_vec(gather(s, &self.layout)),
            ArrayData::I64(s) => bytemuck::cast_vec(gather(s, &self.layout)),
            ArrayData::F32(s) => bytemuck::cast_vec(gather(s, &self.layout)),
            ArrayData::F64(s) => bytemuck::cast_vec(gather(s, &self.layout)),
        })
    }

    /// Read an integer array out as widened `i64` values in logical order
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        match &self.data {
            ArrayData::I16(s) => Ok(gather(s, &self.layout)
                .into_iter()
                .map(|v| v as i64)
                .collect()),
            ArrayData::I32(s) => Ok(gather(s, &self.layout)
                .into_iter()
                .map(|v| v as i64)
                .collect()),
            ArrayData::I64(s) => Ok(gather(s, &self.layout)),
            _ => Err(Error::unsupported_dtype(self.dtype(), "Array::to_i64_vec")),
        }
    }

    /// Read any numeric array out as `f64` values in logical order
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            ArrayData::I16(s) => gather(s, &self.layout)
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            ArrayData::I32(s) => gather(s, &self.layout)
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            ArrayData::I64(s) => gather(s, &self.layout)
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            ArrayData::F32(s) => gather(s, &self.layout)
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            ArrayData::F64(s) => gather(s, &self.layout),
        }
    }

    /// Convert to another dtype, copying the data
    ///
    /// Integer-to-integer conversions are range-checked; conversions to a
    /// float dtype go through `f64`. Float-to-integer conversion is not
    /// supported.
    pub fn cast(&self, dtype: DType) -> Result<Array> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        let shape = self.shape().to_vec();
        if dtype.is_int() {
            if !self.dtype().is_int() {
                return Err(Error::unsupported_dtype(self.dtype(), "Array::cast"));
            }
            let host = self.to_i64_vec()?;
            Array::from_i64_slice(&host, &shape, dtype)
        } else {
            Array::from_f64_slice(&self.to_f64_vec(), &shape, dtype)
        }
    }

    /// Concatenate arrays along a dimension
    ///
    /// All parts must share dtype and rank 2; `dim` 0 stacks rows, `dim` 1
    /// appends columns.
    pub fn cat(parts: &[&Array], dim: usize) -> Result<Array> {
        let first = *parts
            .first()
            .ok_or_else(|| Error::invalid_argument("parts", "empty concatenation"))?;
        let dtype = first.dtype();
        for part in parts {
            if part.dtype() != dtype {
                return Err(Error::DTypeMismatch {
                    lhs: dtype,
                    rhs: part.dtype(),
                });
            }
            if part.ndim() != 2 {
                return Err(Error::shape_mismatch(&[2], &[part.ndim()]));
            }
        }
        if dim > 1 {
            return Err(Error::invalid_argument(
                "dim",
                format!("dimension {} out of range for rank 2", dim),
            ));
        }
        dispatch_dtype!(dtype, T => {
            if dim == 0 {
                let cols = first.shape()[1];
                let mut out: Vec<T> = Vec::new();
                let mut rows = 0usize;
                for part in parts {
                    if part.shape()[1] != cols {
                        return Err(Error::shape_mismatch(
                            &[part.shape()[0], cols],
                            part.shape(),
                        ));
                    }
                    out.extend(part.to_vec::<T>()?);
                    rows += part.shape()[0];
                }
                Array::try_from_slice(&out, &[rows, cols])
            } else {
                let rows = first.shape()[0];
                let mut total_cols = 0usize;
                let mut hosts: Vec<(Vec<T>, usize)> = Vec::with_capacity(parts.len());
                for part in parts {
                    if part.shape()[0] != rows {
                        return Err(Error::shape_mismatch(
                            &[rows, part.shape()[1]],
                            part.shape(),
                        ));
                    }
                    total_cols += part.shape()[1];
                    hosts.push((part.to_vec::<T>()?, part.shape()[1]));
                }
                let mut out: Vec<T> = Vec::with_capacity(rows * total_cols);
                for r in 0..rows {
                    for (host, cols) in &hosts {
                        out.extend_from_slice(&host[r * cols..(r + 1) * cols]);
                    }
                }
                Array::try_from_slice(&out, &[rows, total_cols])
            }
        }, "Array::cat")
    }

    /// Read a single integer element, widened to `i64`
    pub fn i64_at(&self, idx: &[usize]) -> Result<i64> {
        if idx.len() != self.ndim() {
            return Err(Error::shape_mismatch(&[self.ndim()], &[idx.len()]));
        }
        for (&i, &dim) in idx.iter().zip(self.shape()) {
            if i >= dim {
                return Err(Error::IndexOutOfBounds { index: i, size: dim });
            }
        }
        let pos = self.layout.index_of(idx);
        match &self.data {
            ArrayData::I16(s) => Ok(s[pos] as i64),
            ArrayData::I32(s) => Ok(s[pos] as i64),
            ArrayData::I64(s) => Ok(s[pos]),
            _ => Err(Error::unsupported_dtype(self.dtype(), "Array::i64_at")),
        }
    }

    /// Whether two arrays share the same underlying storage
    pub fn shares_storage(&self, other: &Array) -> bool {
        match (&self.data, &other.data) {
            (ArrayData::I16(a), ArrayData::I16(b)) => Arc::ptr_eq(a, b),
            (ArrayData::I32(a), ArrayData::I32(b)) => Arc::ptr_eq(a, b),
            (ArrayData::I64(a), ArrayData::I64(b)) => Arc::ptr_eq(a, b),
            (ArrayData::F32(a), ArrayData::F32(b)) => Arc::ptr_eq(a, b),
            (ArrayData::F64(a), ArrayData::F64(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.dtype() != other.dtype() || self.shape() != other.shape() {
            return false;
        }
        match &self.data {
            ArrayData::I16(_) => self.to_vec::<i16>().unwrap() == other.to_vec::<i16>().unwrap(),
            ArrayData::I32(_) => self.to_vec::<i32>().unwrap() == other.to_vec::<i32>().unwrap(),
            ArrayData::I64(_) => self.to_vec::<i64>().unwrap() == other.to_vec::<i64>().unwrap(),
            ArrayData::F32(_) => self.to_vec::<f32>().unwrap() == other.to_vec::<f32>().unwrap(),
            ArrayData::F64(_) => self.to_vec::<f64>().unwrap() == other.to_vec::<f64>().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_roundtrip() {
        let a = Array::from_slice(&[1i64, 2, 3, 4, 5, 6], &[2, 3]);
        assert_eq!(a.dtype(), DType::I64);
        assert_eq!(a.shape(), &[2, 3]);
        assert!(a.is_contiguous());
        assert_eq!(a.to_vec::<i64>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rank_limit() {
        assert!(Array::try_from_slice(&[0i32; 8], &[2, 2, 2]).is_err());
    }

    #[test]
    fn test_transpose_view_and_contiguous() {
        let a = Array::from_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]);
        let at = a.t();
        assert_eq!(at.shape(), &[3, 2]);
        assert!(!at.is_contiguous());
        assert_eq!(at.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
        let atc = at.contiguous();
        assert!(atc.is_contiguous());
        assert_eq!(atc, at);
    }

    #[test]
    fn test_row_view() {
        let a = Array::from_slice(&[0i64, 1, 1, 2, 1, 0, 2, 1], &[2, 4]);
        assert_eq!(a.row(0).unwrap().to_vec::<i64>().unwrap(), vec![0, 1, 1, 2]);
        assert_eq!(a.row(1).unwrap().to_vec::<i64>().unwrap(), vec![1, 0, 2, 1]);
        assert!(a.row(2).is_err());
        assert!(a.row(0).unwrap().shares_storage(&a));
    }

    #[test]
    fn test_widen_and_narrow() {
        let a = Array::from_slice(&[1i16, 5, 3], &[3]);
        assert_eq!(a.to_i64_vec().unwrap(), vec![1, 5, 3]);

        let b = Array::from_i64_slice(&[1, 5, 3], &[3], DType::I16).unwrap();
        assert_eq!(b.dtype(), DType::I16);
        assert_eq!(b, a);

        assert!(Array::from_i64_slice(&[1 << 40], &[1], DType::I16).is_err());
        assert!(Array::from_i64_slice(&[1, 2], &[2], DType::F32).is_err());
    }

    #[test]
    fn test_cast() {
        let a = Array::from_slice(&[1i64, 2, 3], &[3]);
        let b = a.cast(DType::I32).unwrap();
        assert_eq!(b.dtype(), DType::I32);
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 2, 3]);

        let c = a.cast(DType::F64).unwrap();
        assert_eq!(c.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);

        let f = Array::from_slice(&[1.5f32], &[1]);
        assert!(f.cast(DType::I32).is_err());
    }

    #[test]
    fn test_cat() {
        let a = Array::from_slice(&[0i64, 1, 1, 0], &[2, 2]);
        let b = Array::from_slice(&[2i64, 3, 3, 2], &[2, 2]);

        let rows = Array::cat(&[&a, &b], 0).unwrap();
        assert_eq!(rows.shape(), &[4, 2]);
        assert_eq!(
            rows.to_vec::<i64>().unwrap(),
            vec![0, 1, 1, 0, 2, 3, 3, 2]
        );

        let cols = Array::cat(&[&a, &b], 1).unwrap();
        assert_eq!(cols.shape(), &[2, 4]);
        assert_eq!(
            cols.to_vec::<i64>().unwrap(),
            vec![0, 1, 2, 3, 1, 0, 3, 2]
        );
    }

    #[test]
    fn test_shares_storage_across_dtypes() {
        let a = Array::from_slice(&[1i32, 2], &[2]);
        let b = Array::from_slice(&[1i64, 2], &[2]);
        assert!(!a.shares_storage(&b));
        assert!(a.shares_storage(&a.clone()));
    }

    #[test]
    fn test_ones_and_arange() {
        let v = Array::ones(&[3], DType::F32).unwrap();
        assert_eq!(v.to_vec::<f32>().unwrap(), vec![1.0, 1.0, 1.0]);
        assert_eq!(Array::arange(4).to_vec::<i64>().unwrap(), vec![0, 1, 2, 3]);
    }
}
