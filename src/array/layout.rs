//! Shape, strides, and offset describing a view into shared storage

/// Shape, strides, and offset defining a view into storage
///
/// Strides are expressed in elements, not bytes. Rank is limited to 1 or 2;
/// the adjacency index only ever deals in coordinate pairs, pointer vectors,
/// and dense matrices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl Layout {
    /// Create a contiguous row-major layout for the given shape
    pub fn contiguous(shape: &[usize]) -> Self {
        let mut strides = vec![0isize; shape.len()];
        let mut acc = 1isize;
        for (i, &dim) in shape.iter().enumerate().rev() {
            strides[i] = acc;
            acc *= dim as isize;
        }
        Self {
            shape: shape.to_vec(),
            strides,
            offset: 0,
        }
    }

    /// Create a layout from raw parts
    pub fn new(shape: Vec<usize>, strides: Vec<isize>, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            shape,
            strides,
            offset,
        }
    }

    /// The shape of the view
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The strides of the view, in elements
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Offset of the first element, in elements
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the view is a dense row-major prefix of its storage
    pub fn is_contiguous(&self) -> bool {
        if self.offset != 0 {
            return false;
        }
        let mut acc = 1isize;
        for (&dim, &stride) in self.shape.iter().zip(self.strides.iter()).rev() {
            if dim > 1 && stride != acc {
                return false;
            }
            acc *= dim as isize;
        }
        true
    }

    /// Layout with the dimension order reversed (matrix transpose for rank 2)
    pub fn transposed(&self) -> Self {
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.reverse();
        strides.reverse();
        Self {
            shape,
            strides,
            offset: self.offset,
        }
    }

    /// Storage index of a logical position
    #[inline]
    pub fn index_of(&self, idx: &[usize]) -> usize {
        debug_assert_eq!(idx.len(), self.shape.len());
        let mut pos = self.offset as isize;
        for (&i, &s) in idx.iter().zip(self.strides.iter()) {
            pos += i as isize * s;
        }
        pos as usize
    }
}
