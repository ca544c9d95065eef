//! Floating point bounds used across the crate

use ndarray::{NdFloat, ScalarOperand};
use ndarray_linalg::{Lapack, Scalar};
use num_traits::{AsPrimitive, FromPrimitive, NumCast, Signed};
use rand::distributions::uniform::SampleUniform;
use std::iter::Sum;

/// Scalar type the embedding pipeline is generic over.
///
/// Bundles the arithmetic bounds of `ndarray`, the LAPACK bounds of
/// `ndarray-linalg` and the sampling bounds of `rand` so that algorithm
/// signatures stay readable. Implemented for `f32` and `f64`.
pub trait Float:
    'static
    + NdFloat
    + FromPrimitive
    + Default
    + Signed
    + Sum
    + ScalarOperand
    + SampleUniform
    + approx::AbsDiffEq<Epsilon = Self>
    + Unpin
    + Scalar<Real = Self>
    + Lapack
    + AsPrimitive<usize>
{
    fn cast<T: NumCast>(x: T) -> Self {
        NumCast::from(x).unwrap()
    }
}

impl Float for f32 {}
impl Float for f64 {}
