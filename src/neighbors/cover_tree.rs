//! Cover tree over the callback metric
//!
//! Items are opaque to the crate, so the index structure can only lean on
//! the metric itself. The tree keeps the covering invariant
//! `d(parent, child) <= base^(parent level)` together with a per-node bound
//! on the furthest descendant, which makes best-first k-NN queries exact.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use noisy_float::checkers::FiniteChecker;
use noisy_float::NoisyFloat;
use rayon::prelude::*;

use crate::callbacks::Dissimilarity;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

use super::Neighbors;

type Key<F> = NoisyFloat<F, FiniteChecker>;

struct Node<F> {
    point: usize,
    level: i32,
    /// Distance to the furthest point in this node's subtree.
    maxdist: F,
    children: Vec<usize>,
}

pub struct CoverTree<F> {
    nodes: Vec<Node<F>>,
    root: Option<usize>,
    base: F,
}

impl<F: Float> CoverTree<F> {
    /// Inserts the items one by one, descending to the first child whose
    /// covering radius reaches the new point.
    pub fn build<I, M>(items: &[I], metric: &M) -> Self
    where
        I: Sync,
        M: Dissimilarity<F, I>,
    {
        let mut tree = CoverTree {
            nodes: Vec::with_capacity(items.len()),
            root: None,
            base: F::cast(2.0),
        };
        for index in 0..items.len() {
            tree.insert(index, items, metric);
        }
        tree
    }

    fn covdist(&self, level: i32) -> F {
        num_traits::Float::powi(self.base, level)
    }

    fn insert<I, M>(&mut self, point: usize, items: &[I], metric: &M)
    where
        M: Dissimilarity<F, I>,
    {
        let root = match self.root {
            None => {
                self.nodes.push(Node {
                    point,
                    level: 0,
                    maxdist: F::zero(),
                    children: Vec::new(),
                });
                self.root = Some(0);
                return;
            }
            Some(root) => root,
        };

        // raise the root until it covers the new point
        let to_root = metric.between(&items[point], &items[self.nodes[root].point]);
        while to_root > self.covdist(self.nodes[root].level) {
            self.nodes[root].level += 1;
        }

        let mut current = root;
        let mut to_current = to_root;
        loop {
            if self.nodes[current].maxdist < to_current {
                self.nodes[current].maxdist = to_current;
            }

            // nearest child that still covers the point
            let mut next: Option<(Key<F>, usize)> = None;
            for &child in &self.nodes[current].children {
                let d = metric.between(&items[point], &items[self.nodes[child].point]);
                if d <= self.covdist(self.nodes[child].level) {
                    let key = NoisyFloat::new(d);
                    if next.map_or(true, |(best, _)| key < best) {
                        next = Some((key, child));
                    }
                }
            }

            match next {
                Some((key, child)) => {
                    current = child;
                    to_current = key.raw();
                }
                None => {
                    let level = self.nodes[current].level - 1;
                    self.nodes.push(Node {
                        point,
                        level,
                        maxdist: F::zero(),
                        children: Vec::new(),
                    });
                    let id = self.nodes.len() - 1;
                    self.nodes[current].children.push(id);
                    return;
                }
            }
        }
    }

    /// Exact k-nearest query by best-first traversal; subtrees whose lower
    /// bound cannot beat the current k-th distance are pruned.
    pub fn k_nearest<I, M>(
        &self,
        query: &I,
        exclude: usize,
        k: usize,
        items: &[I],
        metric: &M,
    ) -> Vec<usize>
    where
        M: Dissimilarity<F, I>,
    {
        let root = match self.root {
            Some(root) => root,
            None => return Vec::new(),
        };

        // max-heap of the k best (distance, index) pairs seen so far
        let mut best: BinaryHeap<(Key<F>, usize)> = BinaryHeap::with_capacity(k + 1);
        // min-heap over subtree lower bounds
        let mut frontier: BinaryHeap<Reverse<(Key<F>, usize)>> = BinaryHeap::new();

        let to_root = metric.between(query, &items[self.nodes[root].point]);
        frontier.push(Reverse((self.lower_bound(root, to_root), root)));
        let mut point_dist = vec![F::nan(); self.nodes.len()];
        point_dist[root] = to_root;

        while let Some(Reverse((bound, node))) = frontier.pop() {
            if best.len() == k {
                if let Some(&(worst, _)) = best.peek() {
                    if bound > worst {
                        break;
                    }
                }
            }

            let d = point_dist[node];
            let point = self.nodes[node].point;
            if point != exclude {
                let entry = (NoisyFloat::new(d), point);
                if best.len() < k {
                    best.push(entry);
                } else if let Some(&worst) = best.peek() {
                    if entry < worst {
                        best.pop();
                        best.push(entry);
                    }
                }
            }

            for &child in &self.nodes[node].children {
                let d_child = metric.between(query, &items[self.nodes[child].point]);
                point_dist[child] = d_child;
                let bound = self.lower_bound(child, d_child);
                let admit = match (best.len() < k, best.peek()) {
                    (true, _) => true,
                    (false, Some(&(worst, _))) => bound <= worst,
                    (false, None) => true,
                };
                if admit {
                    frontier.push(Reverse((bound, child)));
                }
            }
        }

        let mut result: Vec<(Key<F>, usize)> = best.into_vec();
        result.sort_unstable();
        result.into_iter().map(|(_, index)| index).collect()
    }

    fn lower_bound(&self, node: usize, dist: F) -> Key<F> {
        NoisyFloat::new((dist - self.nodes[node].maxdist).max(F::zero()))
    }

    pub(super) fn find_neighbors<I, M>(
        &self,
        items: &[I],
        metric: &M,
        k: usize,
        ctx: &Context,
    ) -> Result<Neighbors>
    where
        I: Sync,
        M: Dissimilarity<F, I>,
        F: Float,
    {
        (0..items.len())
            .into_par_iter()
            .map(|i| {
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                Ok(self.k_nearest(&items[i], i, k, items, metric))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::PlainDistance;
    use ndarray::Array2;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn euclidean(a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn agrees_with_exhaustive_search_on_random_points() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let data = Array2::<f64>::random_using((120, 3), Uniform::new(-1.0, 1.0), &mut rng);
        let items: Vec<Vec<f64>> = data.rows().into_iter().map(|r| r.to_vec()).collect();

        let metric = PlainDistance(&euclidean);
        let tree = CoverTree::build(&items, &metric);

        for i in 0..items.len() {
            let got = tree.k_nearest(&items[i], i, 6, &items, &metric);
            let mut expected: Vec<(NoisyFloat<f64, FiniteChecker>, usize)> = (0..items.len())
                .filter(|&j| j != i)
                .map(|j| (NoisyFloat::new(euclidean(&items[i], &items[j])), j))
                .collect();
            expected.sort_unstable();
            let expected: Vec<usize> = expected.into_iter().take(6).map(|(_, j)| j).collect();
            assert_eq!(got, expected, "row {}", i);
        }
    }

    #[test]
    fn covering_invariant_holds() {
        let mut rng = Xoshiro256Plus::seed_from_u64(11);
        let data = Array2::<f64>::random_using((60, 2), Uniform::new(0.0, 1.0), &mut rng);
        let items: Vec<Vec<f64>> = data.rows().into_iter().map(|r| r.to_vec()).collect();
        let metric = PlainDistance(&euclidean);
        let tree = CoverTree::build(&items, &metric);

        for node in &tree.nodes {
            for &child in &node.children {
                let child = &tree.nodes[child];
                let d = euclidean(&items[node.point], &items[child.point]);
                assert!(d <= tree.covdist(node.level) + 1e-12);
                assert!(child.level < node.level);
            }
        }
    }
}
