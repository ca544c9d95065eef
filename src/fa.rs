//! Factor analysis via expectation maximization

use log::debug;
use ndarray::{Array1, Array2};
use ndarray_linalg::Eigh;
use ndarray_linalg::{Inverse, UPLO};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

/// EM for the latent linear model `x = W z + mu + eps`,
/// `eps ~ N(0, diag(psi))`. Runs until the log-likelihood change drops
/// below `epsilon` or `max_iteration` is reached; returns the posterior
/// latent means, one row per item.
pub(crate) fn factor_analysis_embedding<F: Float>(
    centered: &Array2<F>,
    target_dimension: usize,
    max_iteration: usize,
    epsilon: F,
    seed: Option<u64>,
    ctx: &Context,
) -> Result<Array2<F>> {
    let (dimension, n) = centered.dim();
    let d = target_dimension;

    let mut rng = match seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    };

    // sample covariance of the observed variables
    let scatter = centered.dot(&centered.t()) / F::cast(n);
    let variances = scatter.diag().to_owned();

    let mut loadings =
        Array2::random_using((dimension, d), Uniform::new(-1.0f64, 1.0), &mut rng).mapv(F::cast);
    let mut noise: Array1<F> = variances.mapv(|v| v.max(F::cast(1e-12)));

    let mut previous = F::neg_infinity();
    for iteration in 0..max_iteration {
        ctx.checkpoint()?;

        // E-step: posterior moments through the d x d system
        // M = I + W^T psi^{-1} W
        let noise_inv = noise.mapv(|v| v.recip());
        let mut weighted = loadings.clone();
        for (mut row, &w) in weighted.rows_mut().into_iter().zip(noise_inv.iter()) {
            row *= w;
        }
        let mut posterior = weighted.t().dot(&loadings);
        for i in 0..d {
            posterior[(i, i)] += F::one();
        }
        let posterior_inv = posterior.inv().map_err(|_| Error::EigenFailure)?;

        // E[z | x] for every item
        let latent = posterior_inv.dot(&weighted.t()).dot(centered);
        // sum of E[z z^T | x]
        let second_moment = &posterior_inv * F::cast(n) + &latent.dot(&latent.t());

        // M-step
        let cross = centered.dot(&latent.t());
        let second_inv = second_moment.inv().map_err(|_| Error::EigenFailure)?;
        loadings = cross.dot(&second_inv);
        let explained = (&loadings.dot(&latent.dot(&centered.t())) / F::cast(n)).diag().to_owned();
        noise = (&variances - &explained).mapv(|v| v.max(F::cast(1e-12)));

        // log-likelihood via the Woodbury identity
        let likelihood = log_likelihood(&scatter, &loadings, &noise)?;
        let change = num_traits::Float::abs(likelihood - previous);
        previous = likelihood;
        if change < epsilon {
            debug!("factor analysis converged after {} iterations", iteration + 1);
            break;
        }
    }

    // final posterior projection
    let noise_inv = noise.mapv(|v| v.recip());
    let mut weighted = loadings.clone();
    for (mut row, &w) in weighted.rows_mut().into_iter().zip(noise_inv.iter()) {
        row *= w;
    }
    let mut posterior = weighted.t().dot(&loadings);
    for i in 0..d {
        posterior[(i, i)] += F::one();
    }
    let posterior_inv = posterior.inv().map_err(|_| Error::EigenFailure)?;
    let latent = posterior_inv.dot(&weighted.t()).dot(centered);

    Ok(latent.reversed_axes())
}

/// `-1/2 (log det C + tr(C^{-1} S))` up to constants, with
/// `C = W W^T + diag(psi)` expanded through the matrix inversion and
/// determinant lemmas so only `d x d` factorizations appear.
fn log_likelihood<F: Float>(
    scatter: &Array2<F>,
    loadings: &Array2<F>,
    noise: &Array1<F>,
) -> Result<F> {
    let d = loadings.ncols();
    let noise_inv = noise.mapv(|v| v.recip());

    let mut weighted = loadings.clone();
    for (mut row, &w) in weighted.rows_mut().into_iter().zip(noise_inv.iter()) {
        row *= w;
    }
    let mut capacitance = weighted.t().dot(loadings);
    for i in 0..d {
        capacitance[(i, i)] += F::one();
    }

    // log det C = log det(diag psi) + log det M
    let (eigenvalues, _) = capacitance.eigh(UPLO::Lower).map_err(|_| Error::EigenFailure)?;
    let log_det = noise.mapv(|v| num_traits::Float::ln(v)).sum()
        + eigenvalues.mapv(|v| num_traits::Float::ln(v.max(F::cast(1e-300)))).sum();

    // tr(C^{-1} S) = tr(psi^{-1} S) - tr(M^{-1} W^T psi^{-1} S psi^{-1} W)
    let capacitance_inv = capacitance.inv().map_err(|_| Error::EigenFailure)?;
    let weighted_scatter = weighted.t().dot(&scatter.dot(&weighted));
    let trace_direct = scatter
        .diag()
        .iter()
        .zip(noise_inv.iter())
        .map(|(&s, &w)| s * w)
        .sum::<F>();
    let trace_correction = (&capacitance_inv * &weighted_scatter.t()).sum();

    Ok(-(log_det + trace_direct - trace_correction) / F::cast(2.0))
}
