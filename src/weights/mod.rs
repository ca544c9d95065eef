//! Method-specific weight and scatter matrix builders
//!
//! Every builder is a pure function of the dataset, the neighbor graph and
//! one callback. The per-row kernels run on the rayon pool with private
//! scratch; each worker emits `(row, col, value)` triplets which are merged
//! serially in row order, so the assembled matrix does not depend on
//! scheduling.

pub(crate) mod diffusion;
pub(crate) mod features;
pub(crate) mod isomap;
pub(crate) mod laplacian;
pub(crate) mod locally_linear;
pub(crate) mod mds;

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

/// One triplet of the sparse accumulation.
pub(crate) type Triplet<F> = (usize, usize, F);

/// Runs `row` for every index on the rayon pool, checking cancellation at
/// the top of each row. Results come back in row order.
pub(crate) fn try_rows<T, R>(n: usize, ctx: &Context, row: R) -> Result<Vec<T>>
where
    T: Send,
    R: Fn(usize) -> Result<T> + Sync,
{
    (0..n)
        .into_par_iter()
        .map(|i| {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            row(i)
        })
        .collect()
}

/// Serial row-ordered merge of per-row triplets; duplicates are summed.
pub(crate) fn assemble_sparse<F: Float>(n: usize, rows: Vec<Vec<Triplet<F>>>) -> CsMat<F> {
    let nnz = rows.iter().map(Vec::len).sum();
    let mut triplets = TriMat::with_capacity((n, n), nnz);
    for (row, col, value) in rows.into_iter().flatten() {
        triplets.add_triplet(row, col, value);
    }
    triplets.to_csr()
}

/// `y = m * x` for a sparse symmetric matrix and a dense block of columns.
pub(crate) fn sparse_dot_dense<F: Float>(m: &CsMat<F>, x: &ArrayView2<F>) -> Array2<F> {
    let mut y = Array2::zeros((m.rows(), x.ncols()));
    for (row, vec) in m.outer_iterator().enumerate() {
        for (col, &value) in vec.iter() {
            y.row_mut(row).scaled_add(value, &x.row(col));
        }
    }
    y
}

/// In-place double centering: add the grand mean, subtract row and column
/// means.
pub(crate) fn double_center<F: Float>(matrix: &mut Array2<F>) {
    let row_means = matrix.mean_axis(Axis(1)).unwrap();
    let col_means = matrix.mean_axis(Axis(0)).unwrap();
    let grand_mean = matrix.mean().unwrap();
    for ((i, j), value) in matrix.indexed_iter_mut() {
        *value += grand_mean - row_means[i] - col_means[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn double_centered_matrix_has_zero_margins() {
        let mut m = arr2(&[[1.0, 2.0, 3.0], [4.0, 6.0, 8.0], [0.5, 0.0, -1.0]]);
        double_center(&mut m);
        for mean in m.mean_axis(Axis(0)).unwrap() {
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        }
        for mean in m.mean_axis(Axis(1)).unwrap() {
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn assemble_sums_duplicate_triplets() {
        let rows = vec![vec![(0, 0, 1.0), (0, 1, 2.0)], vec![(0, 0, 0.5)]];
        let matrix = assemble_sparse(2, rows);
        assert_abs_diff_eq!(*matrix.get(0, 0).unwrap(), 1.5);
        assert_abs_diff_eq!(*matrix.get(0, 1).unwrap(), 2.0);
        assert!(matrix.get(1, 1).is_none());
    }

    #[test]
    fn sparse_multiply_matches_dense() {
        let rows = vec![vec![(0, 0, 2.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 2.0)]];
        let m = assemble_sparse(2, rows);
        let x = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let y = sparse_dot_dense(&m, &x.view());
        assert_abs_diff_eq!(y, arr2(&[[2.0, -1.0], [-1.0, 2.0]]), epsilon = 1e-12);
    }
}
