//! # edgeix
//!
//! **A sparse adjacency index that remembers what it knows about itself.**
//!
//! edgeix stores graph connectivity as a `2 x E` coordinate array and
//! tracks metadata alongside it: the matrix size, whether the edges are
//! sorted by row or column, and whether the graph is undirected. Derived
//! structures (compressed CSR/CSC pointers and the permutation into the
//! transposed ordering) are computed lazily, cached, and carried through
//! transforms whenever the result provably preserves them.
//!
//! ## Features
//!
//! - **Metadata propagation**: sorting, flips, concatenation, and slicing
//!   keep every claim and cache that survives the transform
//! - **Format export**: dense matrices plus COO, CSR, and CSC triples
//! - **Sparse-dense matmul**: sum/mean/min/max reductions, a grouped and
//!   a scatter execution strategy, and gradients for both operands
//! - **Sparse-sparse matmul**: row-by-row expansion with merged duplicates
//! - **Multiple coordinate widths**: i16, i32, i64 behind one container
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edgeix::prelude::*;
//!
//! let mut index = EdgeIndex::from_slices(&[0, 1, 1, 2], &[1, 0, 2, 1])?
//!     .with_sparse_size(Some(3), Some(3))
//!     .with_sort_order(SortOrder::Row);
//! index.fill_cache_()?;
//!
//! let x = Array::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]);
//! let out = matmul(&mut index, None, &x, ReduceOp::Sum, false)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded multiplication kernels
//! - `serde`: serialization of [`index::EdgeIndexState`] snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod array;
pub mod dtype;
pub mod error;
pub mod index;
pub mod matmul;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::{Array, Layout};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::index::{CastResult, CooData, CscData, CsrData, EdgeIndex, SortOrder};
    pub use crate::matmul::{matmul, matmul_with_grad, spspmm, MatmulCtx, ReduceOp};
}
