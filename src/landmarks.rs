//! Landmark selection and out-of-sample triangulation

use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::Float;

/// `ceil(ratio * n)` indices drawn uniformly without replacement, sorted.
pub(crate) fn select_landmarks_random(n: usize, ratio: f64, seed: Option<u64>) -> Vec<usize> {
    let amount = ((ratio * n as f64).ceil() as usize).clamp(1, n);
    let mut rng = match seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    };
    let mut landmarks = index::sample(&mut rng, n, amount).into_vec();
    landmarks.sort_unstable();
    landmarks
}

/// Places every item from its squared distances to the landmarks:
/// `y(x) = -1/2 Lambda^{-1/2} V^T (d^2(x, L) - mean_L d^2)`, with
/// `(V, Lambda)` the eigenpairs of the centered landmark Gram and the mean
/// taken over the landmark columns of the landmark block. At a landmark
/// ratio of one this reproduces classical MDS.
pub(crate) fn triangulate<F: Float>(
    squared_distances: &Array2<F>,
    landmarks: &[usize],
    eigenvectors: &Array2<F>,
    eigenvalues: &Array1<F>,
) -> Array2<F> {
    let n = squared_distances.ncols();
    let target_dimension = eigenvalues.len();

    // per-landmark mean of the landmark x landmark block
    let block_columns: Vec<usize> = landmarks.to_vec();
    let block = squared_distances.select(Axis(1), &block_columns);
    let landmark_means = block.mean_axis(Axis(1)).unwrap();

    let half = F::cast(-0.5);
    let mut embedding = Array2::zeros((n, target_dimension));
    for j in 0..n {
        let delta = &squared_distances.column(j) - &landmark_means;
        for c in 0..target_dimension {
            let projected = eigenvectors.column(c).dot(&delta);
            embedding[(j, c)] = half * projected / num_traits::Float::sqrt(eigenvalues[c]);
        }
    }
    embedding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_count_and_uniqueness() {
        let landmarks = select_landmarks_random(100, 0.3, Some(5));
        assert_eq!(landmarks.len(), 30);
        let mut sorted = landmarks.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), 30);
        assert!(landmarks.iter().all(|&l| l < 100));
        assert!(landmarks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ratio_one_selects_everything() {
        let landmarks = select_landmarks_random(12, 1.0, Some(1));
        assert_eq!(landmarks, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_selection_is_reproducible() {
        assert_eq!(
            select_landmarks_random(50, 0.5, Some(77)),
            select_landmarks_random(50, 0.5, Some(77))
        );
    }
}
