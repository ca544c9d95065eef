//! Feature-space matrices: covariance, centered kernel and the
//! generalized eigenproblem pairs of the linear neighborhood methods

use ndarray::{Array1, Array2, Axis};
use sprs::CsMat;

use crate::callbacks::KernelCallback;
use crate::context::Context;
use crate::error::Result;
use crate::Float;

use super::{double_center, sparse_dot_dense, try_rows};

/// Mean feature vector over the columns of the `dimension x n` matrix.
pub(crate) fn compute_mean<F: Float>(features: &Array2<F>) -> Array1<F> {
    features.mean_axis(Axis(1)).unwrap()
}

/// Subtracts the mean from every column.
pub(crate) fn center_columns<F: Float>(features: &mut Array2<F>, mean: &Array1<F>) {
    for mut column in features.columns_mut() {
        column -= mean;
    }
}

/// Sample covariance `Xc Xc^T / (n - 1)` of centered features.
pub(crate) fn compute_covariance<F: Float>(centered: &Array2<F>) -> Array2<F> {
    let n = centered.ncols();
    let normalizer = F::cast((n - 1).max(1));
    centered.dot(&centered.t()) / normalizer
}

/// Double-centered kernel matrix for kernel PCA.
pub(crate) fn compute_centered_kernel<F, I, K>(
    items: &[I],
    kernel: &K,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        Ok((0..n)
            .map(|j| kernel.kernel(&items[i], &items[j]))
            .collect::<Vec<F>>())
    })?;

    let mut matrix = Array2::zeros((n, n));
    for (i, row) in rows.into_iter().enumerate() {
        matrix.row_mut(i).assign(&Array1::from(row));
    }
    double_center(&mut matrix);
    Ok(matrix)
}

/// `(Xc M Xc^T, Xc Xc^T)` for the neighborhood preserving and linear LTSA
/// eigenproblems.
pub(crate) fn construct_weighted_eigenproblem<F: Float>(
    centered: &Array2<F>,
    weights: &CsMat<F>,
) -> (Array2<F>, Array2<F>) {
    let weighted = sparse_dot_dense(weights, &centered.t());
    let lhs = centered.dot(&weighted);
    let rhs = centered.dot(&centered.t());
    (lhs, rhs)
}

/// `(Xc L Xc^T, Xc D Xc^T)` for locality preserving projections.
pub(crate) fn construct_locality_eigenproblem<F: Float>(
    centered: &Array2<F>,
    laplacian: &CsMat<F>,
    degrees: &Array1<F>,
) -> (Array2<F>, Array2<F>) {
    let lhs = centered.dot(&sparse_dot_dense(laplacian, &centered.t()));
    let mut scaled = centered.t().to_owned();
    for (mut row, &degree) in scaled.rows_mut().into_iter().zip(degrees.iter()) {
        row *= degree;
    }
    let rhs = centered.dot(&scaled);
    (lhs, rhs)
}
