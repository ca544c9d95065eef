//! k-nearest-neighbor graph construction
//!
//! Both strategies share one output contract: for every item an ordered
//! list of `k` distinct neighbor indices (self excluded), ascending by
//! distance with ties broken towards the smaller index.

mod brute;
mod cover_tree;

use std::collections::VecDeque;

use log::debug;

use crate::callbacks::Dissimilarity;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

pub use cover_tree::CoverTree;

/// Neighbor indices of a single item.
pub type LocalNeighbors = Vec<usize>;
/// Neighbor graph: one row of `k` indices per item.
pub type Neighbors = Vec<LocalNeighbors>;

/// Neighbor search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborsMethodId {
    /// Cover tree over the callback metric.
    CoverTree,
    /// All pairwise distances, k smallest per row.
    Brute,
}

pub(crate) fn find_neighbors<F, I, M>(
    method: NeighborsMethodId,
    items: &[I],
    metric: &M,
    k: usize,
    check_connectivity: bool,
    ctx: &Context,
) -> Result<Neighbors>
where
    F: Float,
    I: Sync,
    M: Dissimilarity<F, I>,
{
    ctx.checkpoint()?;
    debug!("building {}-nn graph over {} items with {:?}", k, items.len(), method);

    let neighbors = match method {
        NeighborsMethodId::Brute => brute::find_neighbors(items, metric, k, ctx)?,
        NeighborsMethodId::CoverTree => {
            let tree = CoverTree::build(items, metric);
            tree.find_neighbors(items, metric, k, ctx)?
        }
    };

    if check_connectivity && !is_connected(&neighbors) {
        return Err(Error::GraphDisconnected);
    }

    Ok(neighbors)
}

/// Breadth-first search over the symmetrized graph.
pub(crate) fn is_connected(neighbors: &Neighbors) -> bool {
    let n = neighbors.len();
    if n == 0 {
        return true;
    }

    let mut adjacency = vec![Vec::new(); n];
    for (i, row) in neighbors.iter().enumerate() {
        for &j in row {
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
    }

    let mut seen = vec![false; n];
    let mut queue = VecDeque::from(vec![0]);
    seen[0] = true;
    let mut visited = 1;
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if !seen[next] {
                seen[next] = true;
                visited += 1;
                queue.push_back(next);
            }
        }
    }
    visited == n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::PlainDistance;

    fn line(n: usize) -> Vec<[f64; 1]> {
        (0..n).map(|i| [i as f64]).collect()
    }

    fn euclidean(a: &[f64; 1], b: &[f64; 1]) -> f64 {
        (a[0] - b[0]).abs()
    }

    #[test]
    fn both_strategies_agree_on_a_line() {
        let items = line(32);
        let ctx = Context::new();
        let brute = find_neighbors(
            NeighborsMethodId::Brute,
            &items,
            &PlainDistance(&euclidean),
            4,
            true,
            &ctx,
        )
        .unwrap();
        let cover = find_neighbors(
            NeighborsMethodId::CoverTree,
            &items,
            &PlainDistance(&euclidean),
            4,
            true,
            &ctx,
        )
        .unwrap();
        assert_eq!(brute, cover);
    }

    #[test]
    fn rows_have_k_distinct_indices_without_self() {
        let items = line(20);
        let neighbors = find_neighbors(
            NeighborsMethodId::Brute,
            &items,
            &PlainDistance(&euclidean),
            5,
            true,
            &Context::new(),
        )
        .unwrap();
        for (i, row) in neighbors.iter().enumerate() {
            assert_eq!(row.len(), 5);
            assert!(!row.contains(&i));
            let mut unique = row.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 5);
        }
    }

    #[test]
    fn ties_prefer_smaller_index() {
        // four corners of a square: both non-adjacent corners tie
        let items = vec![[0.0f64, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let dist = |a: &[f64; 2], b: &[f64; 2]| {
            ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
        };
        let neighbors = find_neighbors(
            NeighborsMethodId::Brute,
            &items,
            &PlainDistance(&dist),
            3,
            true,
            &Context::new(),
        )
        .unwrap();
        // from corner 3, corners 1 and 2 tie at distance 1; 1 must come first
        assert_eq!(neighbors[3], vec![1, 2, 0]);
    }

    #[test]
    fn disconnected_graph_is_detected() {
        let neighbors = vec![vec![1], vec![0], vec![3], vec![2]];
        assert!(!is_connected(&neighbors));
        let neighbors = vec![vec![1], vec![2], vec![3], vec![0]];
        assert!(is_connected(&neighbors));
    }
}
