//! Stochastic proximity embedding

use ndarray::{Array1, Array2};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::callbacks::DistanceCallback;
use crate::context::Context;
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::Float;

/// Pairwise stochastic updates towards the target proximities.
///
/// The global strategy draws pairs from a shuffle of all indices and
/// rescales target distances by `sqrt(2) / max_dist`; the local strategy
/// pairs every drawn point with one of its graph neighbors and uses the
/// raw distances. The learning rate decays linearly to zero.
pub(crate) fn spe_embedding<F, I, D>(
    items: &[I],
    distance: &D,
    neighbors: Option<&Neighbors>,
    target_dimension: usize,
    tolerance: F,
    n_updates: usize,
    seed: Option<u64>,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let global_strategy = neighbors.is_none();
    let nupdates = n_updates.min(n / 2);

    let mut rng = match seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    };

    // distance normalizer of the global strategy
    let alpha = if global_strategy {
        let mut max_dist = F::zero();
        for i in 0..n {
            for j in i + 1..n {
                max_dist = max_dist.max(distance.distance(&items[i], &items[j]));
            }
        }
        num_traits::Float::sqrt(F::cast(2.0)) / max_dist
    } else {
        F::one()
    };

    let mut embedding =
        Array2::random_using((target_dimension, n), Uniform::new(0.0f64, 1.0), &mut rng)
            .mapv(F::cast);

    let mut max_iter = 2000 + (0.04 * (n * n) as f64).round() as usize;
    if !global_strategy {
        max_iter *= 3;
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut difference = Array1::zeros(target_dimension);

    for iteration in 0..max_iter {
        ctx.checkpoint()?;
        if iteration % 1000 == 0 {
            ctx.report_progress(iteration as f64 / max_iter as f64);
        }

        let lambda = F::one() - F::cast(iteration) / F::cast(max_iter);
        indices.shuffle(&mut rng);

        for j in 0..nupdates {
            let a = indices[j];
            let b = if let Some(neighbors) = neighbors {
                let local = &neighbors[a];
                local[rng.gen_range(0..local.len())]
            } else {
                indices[j + nupdates]
            };
            if a == b {
                continue;
            }

            difference.assign(&embedding.column(a));
            difference -= &embedding.column(b);
            let embedded: F = num_traits::Float::sqrt(difference.iter().map(|v| *v * *v).sum::<F>());
            let target = alpha * distance.distance(&items[a], &items[b]);

            let step = lambda / F::cast(2.0) * (target - embedded) / (embedded + tolerance);
            for d in 0..target_dimension {
                let delta = step * difference[d];
                embedding[(d, a)] += delta;
                embedding[(d, b)] -= delta;
            }
        }
    }

    ctx.report_progress(1.0);
    Ok(embedding.reversed_axes())
}
