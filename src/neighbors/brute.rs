//! Exhaustive k-nearest-neighbor search

use noisy_float::checkers::FiniteChecker;
use noisy_float::NoisyFloat;
use rayon::prelude::*;

use crate::callbacks::Dissimilarity;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

use super::Neighbors;

/// Computes all pairwise dissimilarities row by row and keeps the `k`
/// closest per row. Rows are independent, so they run on the rayon pool.
pub(super) fn find_neighbors<F, I, M>(
    items: &[I],
    metric: &M,
    k: usize,
    ctx: &Context,
) -> Result<Neighbors>
where
    F: Float,
    I: Sync,
    M: Dissimilarity<F, I>,
{
    let n = items.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let mut row: Vec<(NoisyFloat<F, FiniteChecker>, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (NoisyFloat::new(metric.between(&items[i], &items[j])), j))
                .collect();
            row.sort_unstable();
            row.truncate(k);
            Ok(row.into_iter().map(|(_, j)| j).collect())
        })
        .collect()
}
