//! Reusable linear projection produced by the linear methods

use ndarray::{Array1, Array2, ArrayView1};

use crate::Float;

/// Linear map `x -> P (x - mu)` from feature space into the embedding.
///
/// Owns its projection matrix (`target_dimension x current_dimension`) and
/// mean vector, so it stays valid after the embedding call returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectingFunction<F> {
    matrix: Array2<F>,
    mean: Array1<F>,
}

impl<F: Float> ProjectingFunction<F> {
    pub(crate) fn new(matrix: Array2<F>, mean: Array1<F>) -> Self {
        ProjectingFunction { matrix, mean }
    }

    /// Projects a new feature vector into the embedding space.
    pub fn project(&self, features: ArrayView1<F>) -> Array1<F> {
        self.matrix.dot(&(&features - &self.mean))
    }

    /// The `target_dimension x current_dimension` projection matrix.
    pub fn matrix(&self) -> &Array2<F> {
        &self.matrix
    }

    /// The mean vector subtracted before projection.
    pub fn mean(&self) -> &Array1<F> {
        &self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn projects_through_the_centered_linear_map() {
        let projection = ProjectingFunction::new(
            arr2(&[[1.0, 0.0, 2.0], [0.0, -1.0, 0.5]]),
            arr1(&[0.5, 1.0, 0.0]),
        );
        let projected = projection.project(arr1(&[1.5, 3.0, -2.0]).view());
        assert_abs_diff_eq!(projected, arr1(&[-3.0, -3.0]), epsilon = 1e-12);
    }

    #[test]
    fn mean_is_removed_before_projection() {
        let projection = ProjectingFunction::new(arr2(&[[1.0, 1.0]]), arr1(&[1.0, 2.0]));
        let projected = projection.project(arr1(&[1.0, 2.0]).view());
        assert_abs_diff_eq!(projected[0], 0.0, epsilon = 1e-12);
    }
}
