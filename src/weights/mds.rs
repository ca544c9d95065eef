//! Squared-distance matrices for classical and landmark MDS

use ndarray::{Array1, Array2};

use crate::callbacks::DistanceCallback;
use crate::context::Context;
use crate::error::Result;
use crate::Float;

use super::try_rows;

/// Full `n x n` matrix of squared pairwise distances.
pub(crate) fn compute_squared_distance_matrix<F, I, D>(
    items: &[I],
    distance: &D,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(n, ctx, |i| {
        Ok((0..n)
            .map(|j| {
                let d = distance.distance(&items[i], &items[j]);
                d * d
            })
            .collect::<Vec<F>>())
    })?;
    Ok(collect_rows(rows, n))
}

/// `landmarks.len() x n` matrix of squared distances from each landmark to
/// every item.
pub(crate) fn compute_landmark_squared_distances<F, I, D>(
    items: &[I],
    landmarks: &[usize],
    distance: &D,
    ctx: &Context,
) -> Result<Array2<F>>
where
    F: Float,
    I: Sync,
    D: DistanceCallback<F, I>,
{
    let n = items.len();
    let rows = try_rows(landmarks.len(), ctx, |row| {
        let l = landmarks[row];
        Ok((0..n)
            .map(|j| {
                let d = distance.distance(&items[l], &items[j]);
                d * d
            })
            .collect::<Vec<F>>())
    })?;
    Ok(collect_rows(rows, n))
}

fn collect_rows<F: Float>(rows: Vec<Vec<F>>, width: usize) -> Array2<F> {
    let mut matrix = Array2::zeros((rows.len(), width));
    for (i, row) in rows.into_iter().enumerate() {
        matrix.row_mut(i).assign(&Array1::from(row));
    }
    matrix
}
