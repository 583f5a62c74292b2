//! Data type system for edgeix arrays
//!
//! This module provides the `DType` enum representing the element types this
//! crate supports, the `Element` trait connecting Rust types to dtypes, and
//! the runtime dispatch macros used to call generic kernels.
//!
//! Coordinate buffers are restricted to the signed integer widths `I16`,
//! `I32`, `I64`; value and dense buffers use `F32` or `F64`.

use bytemuck::{Pod, Zeroable};
use num_traits::NumCast;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Data types supported by edgeix arrays
///
/// Using a runtime enum (rather than generics on every container) allows
/// mixed-width coordinate buffers behind one container type. The discriminant
/// values are stable for serialization purposes and are never changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DType {
    /// 16-bit signed integer
    I16 = 0,
    /// 32-bit signed integer
    I32 = 1,
    /// 64-bit signed integer
    I64 = 2,
    /// 32-bit floating point
    F32 = 10,
    /// 64-bit floating point
    F64 = 11,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Returns true if this is a signed integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Get the default dtype for coordinate buffers
    #[inline]
    pub const fn default_index() -> Self {
        Self::I64
    }

    /// Get the default dtype for value buffers
    #[inline]
    pub const fn default_float() -> Self {
        Self::F32
    }

    /// Short name for display (e.g., "i64", "f32")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Trait for types that can be elements of an edgeix array
///
/// This trait connects Rust's type system to the runtime dtype system.
/// `Pod + Zeroable` enables safe slice transmutation during array
/// construction; the arithmetic and comparison bounds are what the
/// multiplication kernels need.
pub trait Element:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

/// Integer element types usable as coordinates
///
/// Adds lossless round-trips through `i64`, the width all host-side kernels
/// compute in. Narrowing conversions are checked.
pub trait IndexElement: Element {
    /// Widen to i64
    fn to_i64(self) -> i64;

    /// Narrow from i64, returning `None` when the value does not fit
    fn try_from_i64(v: i64) -> Option<Self>;
}

macro_rules! impl_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn zero() -> Self {
                0 as $t
            }

            #[inline]
            fn one() -> Self {
                1 as $t
            }
        }
    };
}

impl_element!(i16, DType::I16);
impl_element!(i32, DType::I32);
impl_element!(i64, DType::I64);
impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);

macro_rules! impl_index_element {
    ($t:ty) => {
        impl IndexElement for $t {
            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn try_from_i64(v: i64) -> Option<Self> {
                NumCast::from(v)
            }
        }
    };
}

impl_index_element!(i16);
impl_index_element!(i32);
impl_index_element!(i64);

/// Macro for runtime dtype dispatch to typed operations.
///
/// Takes a `DType` value and executes a code block with `T` bound to the
/// corresponding Rust type.
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

/// Macro for runtime dispatch restricted to integer dtypes.
///
/// Floating point dtypes return `UnsupportedDType`; the enclosing function
/// must return `Result`.
#[macro_export]
macro_rules! dispatch_int_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $error_op,
                })
            }
        }
    };
}

/// Macro for runtime dispatch restricted to floating point dtypes.
///
/// Integer dtypes return `UnsupportedDType`; the enclosing function must
/// return `Result`.
#[macro_export]
macro_rules! dispatch_float_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $error_op,
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::I16.size_in_bytes(), 2);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::I64.size_in_bytes(), 8);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
    }

    #[test]
    fn test_dtype_categories() {
        assert!(DType::I32.is_int());
        assert!(!DType::I32.is_float());
        assert!(DType::F64.is_float());
        assert!(!DType::F64.is_int());
        assert_eq!(DType::default_index(), DType::I64);
        assert_eq!(DType::default_float(), DType::F32);
    }

    #[test]
    fn test_index_element_roundtrip() {
        assert_eq!(i16::try_from_i64(123), Some(123i16));
        assert_eq!(i16::try_from_i64(1 << 40), None);
        assert_eq!(i32::try_from_i64(-7), Some(-7i32));
        assert_eq!(42i64.to_i64(), 42);
    }

    #[test]
    fn test_short_names() {
        assert_eq!(DType::I16.short_name(), "i16");
        assert_eq!(DType::F64.to_string(), "f64");
    }
}
