//! Geodesic distances over the neighbor graph

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ndarray::{Array1, Array2};
use noisy_float::checkers::FiniteChecker;
use noisy_float::NoisyFloat;

use crate::callbacks::DistanceCallback;
use crate::context::Context;
use crate::error::Result;
use crate::neighbors::Neighbors;
use crate::Float;

use super::try_rows;

type Key<F> = NoisyFloat<F, FiniteChecker>;

/// Shortest-path distances from every source to every item, Dijkstra per
/// source over the symmetrized neighbor graph weighted by the user
/// distance. Unreachable pairs stay at infinity; the connectivity check of
/// the neighbor stage rules them out beforehand.
pub(crate) fn compute_shortest_distances<F, I, D>(
    items: &[I],
    neighbors: &Neighbors,
    sources: &[usize],
    distance: &D,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let mut adjacency: Vec<Vec<(usize, F)>> = vec![Vec::new(); n];
    for (i, row) in neighbors.iter().enumerate() {
        for &j in row {
            let d = distance.distance(&items[i], &items[j]);
            adjacency[i].push((j, d));
            adjacency[j].push((i, d));
        }
    }

    let rows = try_rows(sources.len(), ctx, |row| {
        Ok(dijkstra(&adjacency, sources[row]))
    })?;

    let mut matrix = Array2::zeros((sources.len(), n));
    for (i, row) in rows.into_iter().enumerate() {
        matrix.row_mut(i).assign(&Array1::from(row));
    }
    Ok(matrix)
}

fn dijkstra<F: Float>(adjacency: &[Vec<(usize, F)>], source: usize) -> Vec<F> {
    let n = adjacency.len();
    let mut dist = vec![F::infinity(); n];
    let mut done = vec![false; n];
    let mut frontier: BinaryHeap<Reverse<(Key<F>, usize)>> = BinaryHeap::new();

    dist[source] = F::zero();
    frontier.push(Reverse((NoisyFloat::new(F::zero()), source)));
    while let Some(Reverse((d, node))) = frontier.pop() {
        if done[node] {
            continue;
        }
        done[node] = true;
        for &(next, weight) in &adjacency[node] {
            let candidate = d.raw() + weight;
            if candidate < dist[next] {
                dist[next] = candidate;
                frontier.push(Reverse((NoisyFloat::new(candidate), next)));
            }
        }
    }
    dist
}
