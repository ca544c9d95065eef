//! Locally linear weight matrices: LLE, LTSA and Hessian LLE
//!
//! All three walk the dataset row by row, build a small `k x k` Gram from
//! kernel values of the neighborhood, extract a local model and scatter it
//! into the global sparse matrix.

use ndarray::{s, Array1, Array2};
use ndarray_linalg::{Eigh, SolveH, QR, UPLO};
use sprs::CsMat;

use crate::callbacks::KernelCallback;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::neighbors::Neighbors;
use crate::params::ParameterKey;
use crate::Float;

use super::{assemble_sparse, double_center, try_rows, Triplet};

/// Reconstruction weight matrix `(I - W)^T (I - W)` of kernel LLE.
///
/// For every item the weights reconstructing it from its neighbors solve
/// the regularized Gram system `(G + traceshift tr(G) I) w = 1`, normalized
/// to sum one. `eigenshift` lands on the diagonal to keep the assembled
/// matrix away from an exactly singular nullspace.
pub(crate) fn linear_weight_matrix<F, I, K>(
    items: &[I],
    neighbors: &Neighbors,
    kernel: &K,
    eigenshift: F,
    traceshift: F,
    ctx: &Context,
) -> Result<CsMat<F>>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        let local = &neighbors[i];
        let k = local.len();
        let kernel_value = kernel.kernel(&items[i], &items[i]);
        let dots: Array1<F> = local
            .iter()
            .map(|&p| kernel.kernel(&items[i], &items[p]))
            .collect();

        let mut gram = Array2::zeros((k, k));
        for p in 0..k {
            for q in 0..k {
                gram[(p, q)] = kernel_value - dots[p] - dots[q]
                    + kernel.kernel(&items[local[p]], &items[local[q]]);
            }
        }

        let trace = gram.diag().sum();
        for p in 0..k {
            gram[(p, p)] += traceshift * trace;
        }

        let mut weights = gram
            .solveh(&Array1::ones(k))
            .map_err(|_| Error::EigenFailure)?;
        weights /= weights.sum();

        let mut triplets: Vec<Triplet<F>> = Vec::with_capacity(2 + 2 * k + k * k);
        triplets.push((i, i, F::one() + eigenshift));
        for p in 0..k {
            triplets.push((i, local[p], -weights[p]));
            triplets.push((local[p], i, -weights[p]));
            for q in 0..k {
                triplets.push((local[p], local[q], weights[p] * weights[q]));
            }
        }
        Ok(triplets)
    })?;

    Ok(assemble_sparse(n, rows))
}

/// Alignment matrix of local tangent space alignment.
///
/// The local model is `G = [1/sqrt(k) | V]` with `V` the top
/// `target_dimension` eigenvectors of the centered neighborhood Gram; the
/// scatter subtracts `G G^T` from the neighborhood block.
pub(crate) fn tangent_weight_matrix<F, I, K>(
    items: &[I],
    neighbors: &Neighbors,
    kernel: &K,
    target_dimension: usize,
    eigenshift: F,
    ctx: &Context,
) -> Result<CsMat<F>>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        let local = &neighbors[i];
        let k = local.len();

        let mut gram = neighborhood_gram(items, local, kernel);
        double_center(&mut gram);
        let (_, vectors) = gram.eigh(UPLO::Lower).map_err(|_| Error::EigenFailure)?;

        let mut g = Array2::zeros((k, target_dimension + 1));
        g.column_mut(0).fill(F::one() / num_traits::Float::sqrt(F::cast(k)));
        for d in 0..target_dimension {
            g.column_mut(d + 1).assign(&vectors.column(k - d - 1));
        }
        let alignment = g.dot(&g.t());

        let mut triplets: Vec<Triplet<F>> = Vec::with_capacity(1 + k + k * k);
        triplets.push((i, i, eigenshift));
        for p in 0..k {
            triplets.push((local[p], local[p], F::one()));
            for q in 0..k {
                triplets.push((local[p], local[q], -alignment[(p, q)]));
            }
        }
        Ok(triplets)
    })?;

    Ok(assemble_sparse(n, rows))
}

/// Hessian estimator matrix of Hessian LLE (Donoho-Grimes).
///
/// Tangent coordinates come from the centered neighborhood Gram; the local
/// Hessian estimator is the tail of the thin QR of
/// `[1 | V | quadratic terms of V]`.
pub(crate) fn hessian_weight_matrix<F, I, K>(
    items: &[I],
    neighbors: &Neighbors,
    kernel: &K,
    target_dimension: usize,
    ctx: &Context,
) -> Result<CsMat<F>>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
{
    let n = items.len();
    let d = target_dimension;
    let dp = d * (d + 1) / 2;
    let k = neighbors.first().map_or(0, Vec::len);
    if k < 1 + d + dp {
        return Err(Error::out_of_range(
            ParameterKey::NumberOfNeighbors,
            format!("hessian estimator needs at least {} neighbors, got {}", 1 + d + dp, k),
        ));
    }

    let rows = try_rows(n, ctx, |i| {
        let local = &neighbors[i];
        let k = local.len();

        let mut gram = neighborhood_gram(items, local, kernel);
        double_center(&mut gram);
        let (_, vectors) = gram.eigh(UPLO::Lower).map_err(|_| Error::EigenFailure)?;
        let tangent = vectors.slice(s![.., k - d..; -1]);

        let mut design = Array2::zeros((k, 1 + d + dp));
        design.column_mut(0).fill(F::one());
        for m in 0..d {
            design.column_mut(1 + m).assign(&tangent.column(m));
        }
        let mut col = 1 + d;
        for m in 0..d {
            for l in m..d {
                let product = &tangent.column(m).to_owned() * &tangent.column(l);
                design.column_mut(col).assign(&product);
                col += 1;
            }
        }

        let (q, _) = design.qr().map_err(|_| Error::EigenFailure)?;
        let mut estimator = q.slice(s![.., 1 + d..]).to_owned();
        for mut column in estimator.columns_mut() {
            let sum = column.sum();
            if num_traits::Float::abs(sum) > F::cast(1e-5) {
                column.mapv_inplace(|v| v / sum);
            }
        }

        let local_hessian = estimator.dot(&estimator.t());
        let mut triplets: Vec<Triplet<F>> = Vec::with_capacity(k * k);
        for p in 0..k {
            for q in 0..k {
                triplets.push((local[p], local[q], local_hessian[(p, q)]));
            }
        }
        Ok(triplets)
    })?;

    Ok(assemble_sparse(n, rows))
}

fn neighborhood_gram<F, I, K>(items: &[I], local: &[usize], kernel: &K) -> Array2<F>
where
    F: Float,
    K: KernelCallback<F, I>,
{
    let k = local.len();
    let mut gram = Array2::zeros((k, k));
    for p in 0..k {
        for q in 0..k {
            gram[(p, q)] = kernel.kernel(&items[local[p]], &items[local[q]]);
        }
    }
    gram
}
