//! Heat-kernel graph Laplacian

use std::collections::BTreeMap;

use ndarray::Array1;
use sprs::CsMat;

use crate::callbacks::DistanceCallback;
use crate::context::Context;
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::Float;

use super::{assemble_sparse, try_rows, Triplet};

/// Builds `(L = D - W, diag D)` over the neighbor graph with heat weights
/// `exp(-dist^2 / width)`.
///
/// The edge set is deduplicated: an edge reported from both endpoints keeps
/// a single weight, so mutual neighbors are not counted twice.
pub(crate) fn compute_laplacian<F, I, D>(
    items: &[I],
    neighbors: &Neighbors,
    distance: &D,
    width: F,
    ctx: &Context,
) -> Result<(CsMat<F>, Array1<F>)>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        let mut edges = Vec::with_capacity(neighbors[i].len());
        for &j in &neighbors[i] {
            let d = distance.distance(&items[i], &items[j]);
            edges.push((i.min(j), i.max(j), num_traits::Float::exp(-d * d / width)));
        }
        Ok(edges)
    })?;

    let mut edges = BTreeMap::new();
    for (a, b, weight) in rows.into_iter().flatten() {
        edges.insert((a, b), weight);
    }

    let mut degrees = Array1::zeros(n);
    let mut triplets: Vec<Triplet<F>> = Vec::with_capacity(2 * edges.len() + n);
    for (&(a, b), &weight) in &edges {
        degrees[a] += weight;
        degrees[b] += weight;
        triplets.push((a, b, -weight));
        triplets.push((b, a, -weight));
    }
    for i in 0..n {
        triplets.push((i, i, degrees[i]));
    }

    Ok((assemble_sparse(n, vec![triplets]), degrees))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::PlainDistance;
    use crate::neighbors::{find_neighbors, NeighborsMethodId};
    use approx::assert_abs_diff_eq;

    fn euclidean(a: &[f64; 2], b: &[f64; 2]) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
    }

    #[test]
    fn laplacian_rows_sum_to_zero() {
        let items: Vec<[f64; 2]> = (0..12)
            .map(|i| [(i as f64 * 0.7).cos(), (i as f64 * 0.7).sin()])
            .collect();
        let neighbors = find_neighbors(
            NeighborsMethodId::Brute,
            &items,
            &PlainDistance(&euclidean),
            4,
            true,
            &Context::new(),
        )
        .unwrap();
        let (laplacian, degrees) =
            compute_laplacian(&items, &neighbors, &euclidean, 1.0, &Context::new()).unwrap();

        let dense = laplacian.to_dense();
        for (i, row) in dense.rows().into_iter().enumerate() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(dense[(i, i)], degrees[i], epsilon = 1e-12);
            assert!(degrees[i] > 0.0);
        }
        // symmetric
        for ((i, j), v) in dense.indexed_iter() {
            assert_abs_diff_eq!(*v, dense[(j, i)], epsilon = 1e-12);
        }
    }
}
