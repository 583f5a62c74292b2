//! The adjacency index container and its derived caches
//!
//! [`EdgeIndex`] wraps a `2 x E` integer coordinate array together with
//! metadata (sparse size, sort order, undirectedness) and lazily computed
//! derived structures: compressed row/column pointers and the permutation
//! to the transposed ordering. The submodules split the implementation:
//!
//! - `core`: construction, metadata accessors, validation
//! - `cache`: lazy cache computation and `fill_cache_`
//! - `transform`: sort, flip, concatenation, slicing, dtype conversion
//! - `conversion`: export to dense and to COO/CSR/CSC triples

mod cache;
mod conversion;
mod core;
mod transform;

pub use conversion::{CooData, CscData, CsrData};
pub use core::{EdgeIndex, SortOrder};
pub use transform::{CastResult, EdgeIndexState};
