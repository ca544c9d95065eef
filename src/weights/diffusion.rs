//! Diffusion operator for diffusion maps

use ndarray::{Array1, Array2, Axis};

use crate::callbacks::DistanceCallback;
use crate::context::Context;
use crate::error::Result;
use crate::Float;

use super::try_rows;

/// Symmetric diffusion operator `S^t` with
/// `S = D^{-1/2} K D^{-1/2}`, `K(i,j) = exp(-dist^2 / width)` and `D` the
/// diagonal of row sums. `S` is the symmetric conjugate of the transition
/// matrix `D^{-1} K`, so its eigenpairs carry the diffusion geometry while
/// staying in symmetric-solver territory.
pub(crate) fn compute_diffusion_matrix<F, I, D>(
    items: &[I],
    distance: &D,
    width: F,
    timesteps: usize,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        let row: Vec<F> = (0..n)
            .map(|j| {
                let d = distance.distance(&items[i], &items[j]);
                num_traits::Float::exp(-d * d / width)
            })
            .collect();
        Ok(row)
    })?;

    let mut kernel = Array2::zeros((n, n));
    for (i, row) in rows.into_iter().enumerate() {
        kernel.row_mut(i).assign(&Array1::from(row));
    }

    let scale = kernel
        .sum_axis(Axis(1))
        .mapv(|degree: F| num_traits::Float::sqrt(degree).recip());
    for ((i, j), value) in kernel.indexed_iter_mut() {
        *value *= scale[i] * scale[j];
    }

    let base = kernel.clone();
    for _ in 1..timesteps {
        ctx.checkpoint()?;
        kernel = kernel.dot(&base);
    }

    Ok(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn euclidean(a: &[f64; 1], b: &[f64; 1]) -> f64 {
        (a[0] - b[0]).abs()
    }

    #[test]
    fn operator_is_symmetric_with_unit_top_eigenpair() {
        let items: Vec<[f64; 1]> = (0..8).map(|i| [i as f64 * 0.3]).collect();
        let s = compute_diffusion_matrix(&items, &euclidean, 1.0, 1, &Context::new()).unwrap();
        for ((i, j), v) in s.indexed_iter() {
            assert_abs_diff_eq!(*v, s[(j, i)], epsilon = 1e-12);
        }
        // S fixes D^{1/2} 1: the stationary direction of the diffusion
        let kernel_row_sums: Vec<f64> = items
            .iter()
            .map(|a| {
                items
                    .iter()
                    .map(|b| (-euclidean(a, b).powi(2)).exp())
                    .sum::<f64>()
            })
            .collect();
        let stationary = Array1::from(
            kernel_row_sums.iter().map(|d| d.sqrt()).collect::<Vec<_>>(),
        );
        let mapped = s.dot(&stationary);
        for (a, b) in mapped.iter().zip(stationary.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn timesteps_take_matrix_powers() {
        let items: Vec<[f64; 1]> = (0..6).map(|i| [i as f64]).collect();
        let once = compute_diffusion_matrix(&items, &euclidean, 2.0, 1, &Context::new()).unwrap();
        let thrice = compute_diffusion_matrix(&items, &euclidean, 2.0, 3, &Context::new()).unwrap();
        let expected = once.dot(&once).dot(&once);
        assert_abs_diff_eq!(thrice, expected, epsilon = 1e-10);
    }
}
