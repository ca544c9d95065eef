//! Barnes-Hut t-SNE driver
//!
//! The optimizer itself is the external `bhtsne` crate; this module only
//! assembles the data matrix from the feature callback and converts the
//! result back.

use std::convert::TryFrom;

use ndarray::Array2;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::Float;

/// Runs Barnes-Hut t-SNE over the columns of the `dimension x n` feature
/// matrix with squared euclidean affinities.
pub(crate) fn tsne_embedding<F: Float>(
    features: &Array2<F>,
    target_dimension: usize,
    perplexity: F,
    theta: F,
    ctx: &Context,
) -> Result<Array2<F>> {
    let (dimension, n) = features.dim();
    ctx.checkpoint()?;

    let embedding_dim = u8::try_from(target_dimension).map_err(|_| {
        Error::out_of_range(
            crate::params::ParameterKey::TargetDimension,
            "t-SNE embeds into at most 255 dimensions",
        )
    })?;

    // bhtsne consumes row-per-sample slices
    let standard = features.t().to_owned();
    let flat = standard.as_slice().unwrap();
    let data: Vec<&[F]> = flat.chunks(dimension).collect();

    let mut tsne = bhtsne::tSNE::new(&data);
    let embedding = tsne
        .embedding_dim(embedding_dim)
        .perplexity(perplexity)
        .epochs(1000)
        .barnes_hut(theta, |a, b| {
            num_traits::Float::sqrt(
                a.iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| (x - y) * (x - y))
                    .sum::<F>(),
            )
        })
        .embedding();

    ctx.report_progress(1.0);
    Ok(Array2::from_shape_vec((n, target_dimension), embedding)?)
}
