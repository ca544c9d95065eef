//! User callbacks delivering kernel values, distances and feature vectors
//!
//! The pipeline never looks inside an item: everything it learns about the
//! data comes through these traits. Plain closures implement them, so the
//! entry point can be called with `|a: &P, b: &P| ...` directly.

use ndarray::{Array2, ArrayViewMut1};

use crate::Float;

/// Symmetric positive semi-definite kernel between two items.
pub trait KernelCallback<F, I>: Sync {
    fn kernel(&self, a: &I, b: &I) -> F;
}

/// Symmetric dissimilarity between two items, zero on the diagonal.
pub trait DistanceCallback<F, I>: Sync {
    fn distance(&self, a: &I, b: &I) -> F;
}

/// Writes the dense feature vector of an item into a preallocated view.
pub trait FeatureCallback<F, I>: Sync {
    fn feature(&self, item: &I, out: ArrayViewMut1<F>);
}

impl<F, I, T> KernelCallback<F, I> for T
where
    T: Fn(&I, &I) -> F + Sync,
{
    fn kernel(&self, a: &I, b: &I) -> F {
        self(a, b)
    }
}

impl<F, I, T> DistanceCallback<F, I> for T
where
    T: Fn(&I, &I) -> F + Sync,
{
    fn distance(&self, a: &I, b: &I) -> F {
        self(a, b)
    }
}

impl<F, I, T> FeatureCallback<F, I> for T
where
    T: Fn(&I, ArrayViewMut1<F>) + Sync,
{
    fn feature(&self, item: &I, out: ArrayViewMut1<F>) {
        self(item, out)
    }
}

/// Dissimilarity the neighbor index searches under; either the user
/// distance or the distance induced by the kernel.
pub(crate) trait Dissimilarity<F, I>: Sync {
    fn between(&self, a: &I, b: &I) -> F;
}

pub(crate) struct PlainDistance<'a, D>(pub &'a D);

impl<F: Float, I, D: DistanceCallback<F, I>> Dissimilarity<F, I> for PlainDistance<'_, D> {
    fn between(&self, a: &I, b: &I) -> F {
        self.0.distance(a, b)
    }
}

/// `d(a, b) = sqrt(max(0, K(a,a) + K(b,b) - 2 K(a,b)))`
pub(crate) struct KernelDistance<'a, K>(pub &'a K);

impl<F: Float, I, K: KernelCallback<F, I>> Dissimilarity<F, I> for KernelDistance<'_, K> {
    fn between(&self, a: &I, b: &I) -> F {
        let two = F::cast(2.0);
        let sq = self.0.kernel(a, a) + self.0.kernel(b, b) - two * self.0.kernel(a, b);
        num_traits::Float::sqrt(sq.max(F::zero()))
    }
}

/// Assembles the `dimension x n` feature matrix, one column per item.
pub(crate) fn feature_matrix<F, I, V>(items: &[I], feature: &V, dimension: usize) -> Array2<F>
where
    F: Float,
    I: Sync,
    V: FeatureCallback<F, I>,
{
    let mut matrix = Array2::zeros((dimension, items.len()));
    for (item, col) in items.iter().zip(matrix.columns_mut()) {
        feature.feature(item, col);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn kernel_induced_distance_matches_euclidean() {
        let points = [[0.0f64, 0.0], [3.0, 4.0]];
        let dot = |a: &[f64; 2], b: &[f64; 2]| a[0] * b[0] + a[1] * b[1];
        let induced = KernelDistance(&dot);
        assert_abs_diff_eq!(induced.between(&points[0], &points[1]), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(induced.between(&points[1], &points[1]), 0.0, epsilon = 1e-12);
    }

    fn write_scaled(i: &usize, mut out: ArrayViewMut1<f64>) {
        out[0] = *i as f64;
        out[1] = 2.0 * *i as f64;
    }

    #[test]
    fn feature_matrix_is_column_per_item() {
        let items = [0usize, 1, 2];
        let matrix = feature_matrix(&items, &write_scaled, 2);
        assert_eq!(matrix, arr2(&[[0.0, 1.0, 2.0], [0.0, 2.0, 4.0]]));
    }
}
