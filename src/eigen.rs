//! Eigen embedding facade
//!
//! Every spectral method funnels through [`eigen_embedding`] or
//! [`generalized_eigen_embedding`]: the call site fixes which end of the
//! spectrum it wants and how many structurally null eigenpairs to skip,
//! the facade picks the decomposition. Returned eigenvectors always have
//! their first nonzero entry positive, so embeddings are reproducible
//! across solvers.

use log::debug;
use ndarray::{s, Array1, Array2, ArrayView2};
use ndarray_linalg::lobpcg::LobpcgResult;
use ndarray_linalg::{lobpcg, Cholesky, Diag, Eigh, SolveTriangular, TruncatedOrder, UPLO};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use sprs::{CsMat, TriMat};

use crate::error::{Error, Result};
use crate::weights::sparse_dot_dense;
use crate::Float;

/// Eigendecomposition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenEmbeddingMethodId {
    /// Truncated iterative solver (LOBPCG).
    Arpack,
    /// Full dense decomposition.
    Dense,
    /// Randomized subspace iteration; largest-eigenvalue problems only,
    /// others fall back to the dense path.
    Randomized,
}

/// Which end of the spectrum the embedding lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Order {
    Largest,
    Smallest,
}

/// Matrix operand of the facade: dense or sparse, always symmetric.
pub(crate) enum Operator<'a, F: Float> {
    Dense(&'a Array2<F>),
    Sparse(&'a CsMat<F>),
}

impl<'a, F: Float> Operator<'a, F> {
    fn size(&self) -> usize {
        match self {
            Operator::Dense(m) => m.nrows(),
            Operator::Sparse(m) => m.rows(),
        }
    }

    fn apply(&self, x: &ArrayView2<F>) -> Array2<F> {
        match self {
            Operator::Dense(m) => m.dot(x),
            Operator::Sparse(m) => sparse_dot_dense(m, x),
        }
    }

    fn to_dense(&self) -> Array2<F> {
        match self {
            Operator::Dense(m) => (*m).clone(),
            Operator::Sparse(m) => m.to_dense(),
        }
    }
}

/// Right-hand side of a generalized problem `A v = lambda B v`.
pub(crate) enum Rhs<'a, F: Float> {
    /// Positive diagonal (the degree matrix of the Laplacian family).
    Diagonal(&'a Array1<F>),
    /// Dense symmetric positive definite.
    Dense(&'a Array2<F>),
}

/// `target_dimension` eigenpairs of a symmetric operator, from the chosen
/// end of the spectrum, after dropping `skip` structurally null ones
/// (smallest-end problems only).
pub(crate) fn eigen_embedding<F: Float>(
    method: EigenEmbeddingMethodId,
    operator: Operator<F>,
    target_dimension: usize,
    skip: usize,
    order: Order,
    seed: Option<u64>,
) -> Result<(Array2<F>, Array1<F>)> {
    let n = operator.size();
    let wanted = match order {
        Order::Smallest => target_dimension + skip,
        Order::Largest => target_dimension,
    };

    // truncated solvers need room around the invariant subspace
    let method = if n < 5 * wanted + 1 {
        EigenEmbeddingMethodId::Dense
    } else {
        method
    };

    let (mut vectors, values) = match (method, order) {
        (EigenEmbeddingMethodId::Dense, _) => dense_eigenpairs(&operator, target_dimension, skip, order)?,
        (EigenEmbeddingMethodId::Arpack, _) => {
            truncated_eigenpairs(&operator, target_dimension, skip, order, seed)?
        }
        (EigenEmbeddingMethodId::Randomized, Order::Largest) => {
            randomized_eigenpairs(&operator, target_dimension, seed)?
        }
        (EigenEmbeddingMethodId::Randomized, Order::Smallest) => {
            dense_eigenpairs(&operator, target_dimension, skip, order)?
        }
    };

    enforce_sign_convention(&mut vectors);
    Ok((vectors, values))
}

/// Generalized problem, reduced to a standard one.
///
/// A diagonal `B` is folded in symmetrically (`B^{-1/2} A B^{-1/2}`); a
/// dense `B` goes through its Cholesky factor. Either way the
/// back-substituted eigenvectors come out `B`-orthonormal.
pub(crate) fn generalized_eigen_embedding<F: Float>(
    method: EigenEmbeddingMethodId,
    operator: Operator<F>,
    rhs: Rhs<F>,
    target_dimension: usize,
    skip: usize,
    order: Order,
    seed: Option<u64>,
) -> Result<(Array2<F>, Array1<F>)> {
    match rhs {
        Rhs::Diagonal(degrees) => {
            let scale = degrees.mapv(|d| num_traits::Float::sqrt(d).recip());
            let scaled = match operator {
                Operator::Sparse(m) => scale_sparse(m, &scale),
                Operator::Dense(m) => {
                    let mut scaled = (*m).clone();
                    for ((i, j), value) in scaled.indexed_iter_mut() {
                        *value *= scale[i] * scale[j];
                    }
                    return finish_diagonal(
                        eigen_embedding(method, Operator::Dense(&scaled), target_dimension, skip, order, seed)?,
                        &scale,
                    );
                }
            };
            finish_diagonal(
                eigen_embedding(method, Operator::Sparse(&scaled), target_dimension, skip, order, seed)?,
                &scale,
            )
        }
        Rhs::Dense(b) => {
            let lower = b.cholesky(UPLO::Lower).map_err(|_| Error::EigenFailure)?;
            let a = operator.to_dense();
            let half = lower
                .solve_triangular(UPLO::Lower, Diag::NonUnit, &a)
                .map_err(|_| Error::EigenFailure)?;
            let half_t = half.t().to_owned();
            let mut reduced = lower
                .solve_triangular(UPLO::Lower, Diag::NonUnit, &half_t)
                .map_err(|_| Error::EigenFailure)?;
            reduced = (&reduced + &reduced.t()) / F::cast(2.0);

            let (vectors, values) =
                eigen_embedding(method, Operator::Dense(&reduced), target_dimension, skip, order, seed)?;
            let upper = lower.t().to_owned();
            let mut vectors = upper
                .solve_triangular(UPLO::Upper, Diag::NonUnit, &vectors)
                .map_err(|_| Error::EigenFailure)?;
            enforce_sign_convention(&mut vectors);
            Ok((vectors, values))
        }
    }
}

fn finish_diagonal<F: Float>(
    (mut vectors, values): (Array2<F>, Array1<F>),
    scale: &Array1<F>,
) -> Result<(Array2<F>, Array1<F>)> {
    for (mut row, &s) in vectors.rows_mut().into_iter().zip(scale.iter()) {
        row *= s;
    }
    enforce_sign_convention(&mut vectors);
    Ok((vectors, values))
}

fn scale_sparse<F: Float>(matrix: &CsMat<F>, scale: &Array1<F>) -> CsMat<F> {
    let mut triplets = TriMat::with_capacity((matrix.rows(), matrix.cols()), matrix.nnz());
    for (&value, (row, col)) in matrix.iter() {
        triplets.add_triplet(row, col, value * scale[row] * scale[col]);
    }
    triplets.to_csr()
}

fn dense_eigenpairs<F: Float>(
    operator: &Operator<F>,
    target_dimension: usize,
    skip: usize,
    order: Order,
) -> Result<(Array2<F>, Array1<F>)> {
    let matrix = operator.to_dense();
    let n = matrix.nrows();
    let (values, vectors) = matrix.eigh(UPLO::Lower).map_err(|_| Error::EigenFailure)?;
    // eigh returns the spectrum in ascending order
    Ok(match order {
        Order::Smallest => (
            vectors.slice(s![.., skip..skip + target_dimension]).to_owned(),
            values.slice(s![skip..skip + target_dimension]).to_owned(),
        ),
        Order::Largest => (
            vectors.slice(s![.., n - target_dimension..; -1]).to_owned(),
            values.slice(s![n - target_dimension..; -1]).to_owned(),
        ),
    })
}

fn truncated_eigenpairs<F: Float>(
    operator: &Operator<F>,
    target_dimension: usize,
    skip: usize,
    order: Order,
    seed: Option<u64>,
) -> Result<(Array2<F>, Array1<F>)> {
    let n = operator.size();
    let wanted = match order {
        Order::Smallest => target_dimension + skip,
        Order::Largest => target_dimension,
    };

    let mut rng = Xoshiro256Plus::seed_from_u64(seed.unwrap_or(42));
    let guess =
        Array2::random_using((n, wanted), Uniform::new(0.0f64, 1.0), &mut rng).mapv(F::cast);

    let truncated_order = match order {
        Order::Largest => TruncatedOrder::Largest,
        Order::Smallest => TruncatedOrder::Smallest,
    };

    let result = lobpcg::lobpcg(
        |y| operator.apply(&y),
        guess,
        |_| {},
        None,
        1e-10,
        300,
        truncated_order,
    );

    let (values, vectors) = match result {
        LobpcgResult::Ok(values, vectors, _) | LobpcgResult::Err(values, vectors, _, _) => {
            (values, vectors)
        }
        LobpcgResult::NoResult(_) => {
            debug!("truncated eigensolver failed to converge");
            return Err(Error::EigenFailure);
        }
    };

    Ok(match order {
        Order::Smallest => (
            vectors.slice(s![.., skip..]).to_owned(),
            values.slice(s![skip..]).to_owned(),
        ),
        Order::Largest => (vectors, values),
    })
}

/// Randomized subspace iteration for the top of the spectrum.
fn randomized_eigenpairs<F: Float>(
    operator: &Operator<F>,
    target_dimension: usize,
    seed: Option<u64>,
) -> Result<(Array2<F>, Array1<F>)> {
    use ndarray_linalg::QR;

    let n = operator.size();
    let sketch = (target_dimension + 8).min(n);
    let mut rng = Xoshiro256Plus::seed_from_u64(seed.unwrap_or(42));
    let mut basis =
        Array2::random_using((n, sketch), Uniform::new(-1.0f64, 1.0), &mut rng).mapv(F::cast);

    for _ in 0..2 {
        let image = operator.apply(&basis.view());
        let (q, _) = image.qr().map_err(|_| Error::EigenFailure)?;
        basis = q;
    }

    let small = basis.t().dot(&operator.apply(&basis.view()));
    let small = (&small + &small.t()) / F::cast(2.0);
    let (values, vectors) = small.eigh(UPLO::Lower).map_err(|_| Error::EigenFailure)?;
    let m = values.len();
    let top_values = values.slice(s![m - target_dimension..; -1]).to_owned();
    let top_vectors = basis.dot(&vectors.slice(s![.., m - target_dimension..; -1]));
    Ok((top_vectors, top_values))
}

/// Flips columns so the first nonzero entry of every eigenvector is
/// positive.
pub(crate) fn enforce_sign_convention<F: Float>(vectors: &mut Array2<F>) {
    for mut column in vectors.columns_mut() {
        let lead = column.iter().copied().find(|v| *v != F::zero());
        if let Some(lead) = lead {
            if lead < F::zero() {
                column.mapv_inplace(|v| -v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn toy_matrix() -> Array2<f64> {
        // eigenvalues 1, 2, 4 with known eigenvectors
        ndarray::arr2(&[[2.0, 1.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 4.0]])
    }

    #[test]
    fn dense_largest_orders_descending_with_positive_leads() {
        let m = toy_matrix();
        let (vectors, values) =
            eigen_embedding(EigenEmbeddingMethodId::Dense, Operator::Dense(&m), 2, 0, Order::Largest, None)
                .unwrap();
        assert_abs_diff_eq!(values, arr1(&[4.0, 3.0]), epsilon = 1e-10);
        assert_abs_diff_eq!(vectors.column(0).to_owned(), arr1(&[0.0, 0.0, 1.0]), epsilon = 1e-10);
        let s = 1.0 / 2.0f64.sqrt();
        assert_abs_diff_eq!(vectors.column(1).to_owned(), arr1(&[s, s, 0.0]), epsilon = 1e-10);
    }

    #[test]
    fn dense_smallest_skips_leading_eigenpairs() {
        let m = toy_matrix();
        let (_, values) =
            eigen_embedding(EigenEmbeddingMethodId::Dense, Operator::Dense(&m), 1, 1, Order::Smallest, None)
                .unwrap();
        assert_abs_diff_eq!(values, arr1(&[3.0]), epsilon = 1e-10);
    }

    #[test]
    fn truncated_solver_matches_dense_on_larger_problems() {
        use ndarray_rand::rand_distr::Uniform;
        use ndarray_rand::RandomExt;
        use rand::SeedableRng;

        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let raw = Array2::<f64>::random_using((40, 40), Uniform::new(-1.0, 1.0), &mut rng);
        let sym = (&raw + &raw.t()) / 2.0;

        let (dense_vecs, dense_vals) =
            eigen_embedding(EigenEmbeddingMethodId::Dense, Operator::Dense(&sym), 3, 0, Order::Largest, None)
                .unwrap();
        let (arpack_vecs, arpack_vals) =
            eigen_embedding(EigenEmbeddingMethodId::Arpack, Operator::Dense(&sym), 3, 0, Order::Largest, Some(1))
                .unwrap();

        assert_abs_diff_eq!(dense_vals, arpack_vals, epsilon = 1e-5);
        assert_abs_diff_eq!(dense_vecs, arpack_vecs, epsilon = 1e-4);
    }

    #[test]
    fn generalized_diagonal_eigenvectors_are_b_orthonormal() {
        let m = toy_matrix();
        let degrees = arr1(&[1.0, 4.0, 2.0]);
        let (vectors, _) = generalized_eigen_embedding(
            EigenEmbeddingMethodId::Dense,
            Operator::Dense(&m),
            Rhs::Diagonal(&degrees),
            2,
            0,
            Order::Smallest,
            None,
        )
        .unwrap();
        for col in vectors.columns() {
            let norm: f64 = col
                .iter()
                .zip(degrees.iter())
                .map(|(v, d)| v * v * d)
                .sum();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn generalized_dense_solves_the_pencil() {
        let a = ndarray::arr2(&[[2.0, 0.0], [0.0, 8.0]]);
        let b = ndarray::arr2(&[[1.0, 0.0], [0.0, 2.0]]);
        let (vectors, values) = generalized_eigen_embedding(
            EigenEmbeddingMethodId::Dense,
            Operator::Dense(&a),
            Rhs::Dense(&b),
            2,
            0,
            Order::Smallest,
            None,
        )
        .unwrap();
        // pencil eigenvalues are 2 and 4
        assert_abs_diff_eq!(values, arr1(&[2.0, 4.0]), epsilon = 1e-10);
        for (col, &value) in vectors.columns().into_iter().zip(values.iter()) {
            let av = a.dot(&col);
            let bv = b.dot(&col);
            assert_abs_diff_eq!(av.to_owned(), bv.mapv(|x| x * value), epsilon = 1e-8);
        }
    }

    #[test]
    fn sign_convention_makes_first_nonzero_positive() {
        let mut vectors = ndarray::arr2(&[[0.0, -0.5], [-0.7, 0.5], [0.7, 0.0]]);
        enforce_sign_convention(&mut vectors);
        assert_abs_diff_eq!(vectors[(1, 0)], 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(vectors[(0, 1)], 0.5, epsilon = 1e-12);
    }
}
