//! Method dispatch: one entry point, one branch per embedding method

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::callbacks::{
    feature_matrix, DistanceCallback, FeatureCallback, KernelCallback, KernelDistance,
    PlainDistance,
};
use crate::context::Context;
use crate::eigen::{
    eigen_embedding, generalized_eigen_embedding, Operator, Order, Rhs,
};
use crate::error::{Error, Result};
use crate::fa::factor_analysis_embedding;
use crate::landmarks::{select_landmarks_random, triangulate};
use crate::neighbors::{find_neighbors, Neighbors};
use crate::params::{Parameters, ResolvedParams};
use crate::projection::ProjectingFunction;
use crate::spe::spe_embedding;
use crate::tsne::tsne_embedding;
use crate::weights::diffusion::compute_diffusion_matrix;
use crate::weights::features::{
    center_columns, compute_centered_kernel, compute_covariance, compute_mean,
    construct_locality_eigenproblem, construct_weighted_eigenproblem,
};
use crate::weights::isomap::compute_shortest_distances;
use crate::weights::laplacian::compute_laplacian;
use crate::weights::locally_linear::{
    hessian_weight_matrix, linear_weight_matrix, tangent_weight_matrix,
};
use crate::weights::mds::{compute_landmark_squared_distances, compute_squared_distance_matrix};
use crate::weights::double_center;
use crate::Float;

const SKIP_ONE_EIGENVALUE: usize = 1;
const SKIP_NO_EIGENVALUES: usize = 0;

/// The closed set of embedding methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodId {
    KernelLle,
    KernelLtsa,
    HessianLle,
    DiffusionMap,
    Mds,
    LandmarkMds,
    Isomap,
    LandmarkIsomap,
    NeighborhoodPreservingEmbedding,
    LinearLtsa,
    LaplacianEigenmaps,
    LocalityPreservingProjections,
    Pca,
    KernelPca,
    RandomProjection,
    StochasticProximityEmbedding,
    PassThru,
    FactorAnalysis,
    TSne,
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MethodId::KernelLle => "kernel locally linear embedding",
            MethodId::KernelLtsa => "kernel local tangent space alignment",
            MethodId::HessianLle => "hessian locally linear embedding",
            MethodId::DiffusionMap => "diffusion map",
            MethodId::Mds => "multidimensional scaling",
            MethodId::LandmarkMds => "landmark multidimensional scaling",
            MethodId::Isomap => "isomap",
            MethodId::LandmarkIsomap => "landmark isomap",
            MethodId::NeighborhoodPreservingEmbedding => "neighborhood preserving embedding",
            MethodId::LinearLtsa => "linear local tangent space alignment",
            MethodId::LaplacianEigenmaps => "laplacian eigenmaps",
            MethodId::LocalityPreservingProjections => "locality preserving projections",
            MethodId::Pca => "principal component analysis",
            MethodId::KernelPca => "kernel principal component analysis",
            MethodId::RandomProjection => "random projection",
            MethodId::StochasticProximityEmbedding => "stochastic proximity embedding",
            MethodId::PassThru => "pass-through",
            MethodId::FactorAnalysis => "factor analysis",
            MethodId::TSne => "t-distributed stochastic neighbor embedding",
        };
        f.write_str(name)
    }
}

impl FromStr for MethodId {
    type Err = Error;

    /// Parses the compact method identifiers used at host boundaries;
    /// anything unknown is [`Error::UnsupportedMethod`].
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "kernel_lle" | "klle" => MethodId::KernelLle,
            "kernel_ltsa" | "kltsa" => MethodId::KernelLtsa,
            "hessian_lle" | "hlle" => MethodId::HessianLle,
            "diffusion_map" => MethodId::DiffusionMap,
            "mds" => MethodId::Mds,
            "landmark_mds" | "l-mds" => MethodId::LandmarkMds,
            "isomap" => MethodId::Isomap,
            "landmark_isomap" | "l-isomap" => MethodId::LandmarkIsomap,
            "npe" => MethodId::NeighborhoodPreservingEmbedding,
            "linear_ltsa" | "lltsa" => MethodId::LinearLtsa,
            "laplacian_eigenmaps" => MethodId::LaplacianEigenmaps,
            "lpp" => MethodId::LocalityPreservingProjections,
            "pca" => MethodId::Pca,
            "kernel_pca" | "kpca" => MethodId::KernelPca,
            "random_projection" => MethodId::RandomProjection,
            "spe" => MethodId::StochasticProximityEmbedding,
            "passthru" => MethodId::PassThru,
            "factor_analysis" | "fa" => MethodId::FactorAnalysis,
            "tsne" | "t-sne" => MethodId::TSne,
            unknown => return Err(Error::UnsupportedMethod(unknown.to_owned())),
        })
    }
}

/// What an embedding run produces.
#[derive(Debug, Clone)]
pub struct EmbeddingResult<F> {
    /// `n x target_dimension` coordinates, one row per item.
    pub embedding: Array2<F>,
    /// Eigenvalues backing the embedding, for the spectral methods.
    pub eigenvalues: Option<Array1<F>>,
    /// Out-of-sample linear map, for the linear methods.
    pub projection: Option<ProjectingFunction<F>>,
}

impl<F> EmbeddingResult<F> {
    fn plain(embedding: Array2<F>) -> Self {
        EmbeddingResult {
            embedding,
            eigenvalues: None,
            projection: None,
        }
    }

    fn spectral(embedding: Array2<F>, eigenvalues: Array1<F>) -> Self {
        EmbeddingResult {
            embedding,
            eigenvalues: Some(eigenvalues),
            projection: None,
        }
    }
}

/// Embeds `items` with the method selected by the `Method` parameter.
///
/// The callbacks deliver kernel values, distances and feature vectors on
/// demand; which of them a method consumes is documented per method. The
/// cancel predicate of `context` is honored at the documented checkpoints
/// and a cancelled run returns [`Error::Cancelled`] with no partial result.
pub fn embed<F, I, K, D, V>(
    items: &[I],
    kernel: &K,
    distance: &D,
    feature: &V,
    parameters: &Parameters,
    context: &Context,
) -> Result<EmbeddingResult<F>>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
    D: DistanceCallback<F, I>,
    V: FeatureCallback<F, I>,
{
    let method = parameters.method()?;
    let params = ResolvedParams::resolve(parameters, items.len())?;
    context.checkpoint()?;

    let started = Instant::now();
    debug!("embedding {} items with {}", items.len(), method);
    context.report_progress(0.0);

    let driver = Driver {
        items,
        kernel,
        distance,
        feature,
        params,
        ctx: context,
        marker: PhantomData,
    };

    let result = match method {
        MethodId::KernelLle => driver.kernel_lle(),
        MethodId::KernelLtsa => driver.kernel_ltsa(),
        MethodId::HessianLle => driver.hessian_lle(),
        MethodId::DiffusionMap => driver.diffusion_map(),
        MethodId::Mds => driver.mds(),
        MethodId::LandmarkMds => driver.landmark_mds(),
        MethodId::Isomap => driver.isomap(),
        MethodId::LandmarkIsomap => driver.landmark_isomap(),
        MethodId::NeighborhoodPreservingEmbedding => driver.neighborhood_preserving(),
        MethodId::LinearLtsa => driver.linear_ltsa(),
        MethodId::LaplacianEigenmaps => driver.laplacian_eigenmaps(),
        MethodId::LocalityPreservingProjections => driver.locality_preserving(),
        MethodId::Pca => driver.pca(),
        MethodId::KernelPca => driver.kernel_pca(),
        MethodId::RandomProjection => driver.random_projection(),
        MethodId::StochasticProximityEmbedding => driver.spe(),
        MethodId::PassThru => driver.pass_thru(),
        MethodId::FactorAnalysis => driver.factor_analysis(),
        MethodId::TSne => driver.tsne(),
    }?;

    context.report_progress(1.0);
    info!(
        "embedded {} items with {} in {:.2?}",
        items.len(),
        method,
        started.elapsed()
    );
    Ok(result)
}

struct Driver<'a, F, I, K, D, V> {
    items: &'a [I],
    kernel: &'a K,
    distance: &'a D,
    feature: &'a V,
    params: ResolvedParams,
    ctx: &'a Context<'a>,
    marker: PhantomData<F>,
}

impl<'a, F, I, K, D, V> Driver<'a, F, I, K, D, V>
where
    F: Float,
    I: Sync,
    K: KernelCallback<F, I>,
    D: DistanceCallback<F, I>,
    V: FeatureCallback<F, I>,
{
    fn kernel_neighbors(&self) -> Result<Neighbors> {
        find_neighbors(
            self.params.neighbors_method,
            self.items,
            &KernelDistance(self.kernel),
            self.params.n_neighbors()?,
            self.params.check_connectivity,
            self.ctx,
        )
    }

    fn distance_neighbors(&self) -> Result<Neighbors> {
        find_neighbors(
            self.params.neighbors_method,
            self.items,
            &PlainDistance(self.distance),
            self.params.n_neighbors()?,
            self.params.check_connectivity,
            self.ctx,
        )
    }

    fn centered_features(&self) -> Result<(Array2<F>, Array1<F>)> {
        let dimension = self.params.current_dimension()?;
        let mut features = feature_matrix(self.items, self.feature, dimension);
        let mean = compute_mean(&features);
        center_columns(&mut features, &mean);
        Ok((features, mean))
    }

    fn kernel_lle(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.kernel_neighbors()?;
        let weights = linear_weight_matrix(
            self.items,
            &neighbors,
            self.kernel,
            F::cast(self.params.eigenshift),
            F::cast(self.params.traceshift),
            self.ctx,
        )?;
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Sparse(&weights),
            self.params.target_dimension,
            SKIP_ONE_EIGENVALUE,
            Order::Smallest,
            self.params.random_seed()?,
        )?;
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn kernel_ltsa(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.kernel_neighbors()?;
        let weights = tangent_weight_matrix(
            self.items,
            &neighbors,
            self.kernel,
            self.params.target_dimension,
            F::cast(self.params.eigenshift),
            self.ctx,
        )?;
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Sparse(&weights),
            self.params.target_dimension,
            SKIP_ONE_EIGENVALUE,
            Order::Smallest,
            self.params.random_seed()?,
        )?;
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn hessian_lle(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.kernel_neighbors()?;
        let weights = hessian_weight_matrix(
            self.items,
            &neighbors,
            self.kernel,
            self.params.target_dimension,
            self.ctx,
        )?;
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Sparse(&weights),
            self.params.target_dimension,
            SKIP_ONE_EIGENVALUE,
            Order::Smallest,
            self.params.random_seed()?,
        )?;
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn diffusion_map(&self) -> Result<EmbeddingResult<F>> {
        let matrix = compute_diffusion_matrix(
            self.items,
            self.distance,
            F::cast(self.params.width),
            self.params.timesteps,
            self.ctx,
        )?;
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&matrix),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn mds(&self) -> Result<EmbeddingResult<F>> {
        let mut matrix =
            compute_squared_distance_matrix(self.items, self.distance, self.ctx)?;
        double_center(&mut matrix);
        matrix *= F::cast(-0.5);
        let (mut vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&matrix),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        scale_columns_by_sqrt(&mut vectors, &values);
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn landmark_mds(&self) -> Result<EmbeddingResult<F>> {
        let landmarks = select_landmarks_random(
            self.items.len(),
            self.params.ratio,
            self.params.random_seed()?,
        );
        let squared = compute_landmark_squared_distances(
            self.items,
            &landmarks,
            self.distance,
            self.ctx,
        )?;
        let mut block = squared.select(Axis(1), &landmarks);
        double_center(&mut block);
        block *= F::cast(-0.5);
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&block),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        let embedding = triangulate(&squared, &landmarks, &vectors, &values);
        Ok(EmbeddingResult::spectral(embedding, values))
    }

    fn isomap(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.distance_neighbors()?;
        let sources: Vec<usize> = (0..self.items.len()).collect();
        let mut matrix = compute_shortest_distances(
            self.items,
            &neighbors,
            &sources,
            self.distance,
            self.ctx,
        )?;
        matrix.mapv_inplace(|v| v * v);
        double_center(&mut matrix);
        matrix *= F::cast(-0.5);
        let (mut vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&matrix),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        scale_columns_by_sqrt(&mut vectors, &values);
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn landmark_isomap(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.distance_neighbors()?;
        let landmarks = select_landmarks_random(
            self.items.len(),
            self.params.ratio,
            self.params.random_seed()?,
        );
        let mut squared = compute_shortest_distances(
            self.items,
            &neighbors,
            &landmarks,
            self.distance,
            self.ctx,
        )?;
        squared.mapv_inplace(|v| v * v);
        let mut block = squared.select(Axis(1), &landmarks);
        double_center(&mut block);
        block *= F::cast(-0.5);
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&block),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        let embedding = triangulate(&squared, &landmarks, &vectors, &values);
        Ok(EmbeddingResult::spectral(embedding, values))
    }

    fn neighborhood_preserving(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.kernel_neighbors()?;
        let weights = linear_weight_matrix(
            self.items,
            &neighbors,
            self.kernel,
            F::cast(self.params.eigenshift),
            F::cast(self.params.traceshift),
            self.ctx,
        )?;
        let (features, mean) = self.centered_features()?;
        let (lhs, rhs) = construct_weighted_eigenproblem(&features, &weights);
        self.linear_result(features, mean, &lhs, &rhs)
    }

    fn linear_ltsa(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.kernel_neighbors()?;
        let weights = tangent_weight_matrix(
            self.items,
            &neighbors,
            self.kernel,
            self.params.target_dimension,
            F::cast(self.params.eigenshift),
            self.ctx,
        )?;
        let (features, mean) = self.centered_features()?;
        let (lhs, rhs) = construct_weighted_eigenproblem(&features, &weights);
        self.linear_result(features, mean, &lhs, &rhs)
    }

    fn laplacian_eigenmaps(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.distance_neighbors()?;
        let (laplacian, degrees) = compute_laplacian(
            self.items,
            &neighbors,
            self.distance,
            F::cast(self.params.width),
            self.ctx,
        )?;
        let (vectors, values) = generalized_eigen_embedding(
            self.params.eigen_method,
            Operator::Sparse(&laplacian),
            Rhs::Diagonal(&degrees),
            self.params.target_dimension,
            SKIP_ONE_EIGENVALUE,
            Order::Smallest,
            self.params.random_seed()?,
        )?;
        Ok(EmbeddingResult::spectral(vectors, values))
    }

    fn locality_preserving(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = self.distance_neighbors()?;
        let (laplacian, degrees) = compute_laplacian(
            self.items,
            &neighbors,
            self.distance,
            F::cast(self.params.width),
            self.ctx,
        )?;
        let (features, mean) = self.centered_features()?;
        let (lhs, rhs) = construct_locality_eigenproblem(&features, &laplacian, &degrees);
        self.linear_result(features, mean, &lhs, &rhs)
    }

    /// Shared tail of the linear neighborhood methods: solve the pencil,
    /// wrap the projection, embed in-sample items.
    fn linear_result(
        &self,
        features: Array2<F>,
        mean: Array1<F>,
        lhs: &Array2<F>,
        rhs: &Array2<F>,
    ) -> Result<EmbeddingResult<F>> {
        let (vectors, values) = generalized_eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(lhs),
            Rhs::Dense(rhs),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Smallest,
            self.params.random_seed()?,
        )?;
        let projection = ProjectingFunction::new(vectors.t().to_owned(), mean);
        // features are already centered, so apply the matrix directly
        let embedding = projection.matrix().dot(&features).reversed_axes();
        Ok(EmbeddingResult {
            embedding,
            eigenvalues: Some(values),
            projection: Some(projection),
        })
    }

    fn pca(&self) -> Result<EmbeddingResult<F>> {
        let (features, mean) = self.centered_features()?;
        let covariance = compute_covariance(&features);
        let (vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&covariance),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        let projection = ProjectingFunction::new(vectors.t().to_owned(), mean);
        let embedding = projection.matrix().dot(&features).reversed_axes();
        Ok(EmbeddingResult {
            embedding,
            eigenvalues: Some(values),
            projection: Some(projection),
        })
    }

    fn kernel_pca(&self) -> Result<EmbeddingResult<F>> {
        let matrix = compute_centered_kernel(self.items, self.kernel, self.ctx)?;
        let (mut vectors, values) = eigen_embedding(
            self.params.eigen_method,
            Operator::Dense(&matrix),
            self.params.target_dimension,
            SKIP_NO_EIGENVALUES,
            Order::Largest,
            self.params.random_seed()?,
        )?;
        scale_columns_by_sqrt(&mut vectors, &values);
        // report eigenvalues on the covariance scale
        let normalizer = F::cast(self.items.len().saturating_sub(1).max(1));
        Ok(EmbeddingResult::spectral(vectors, values / normalizer))
    }

    fn random_projection(&self) -> Result<EmbeddingResult<F>> {
        let dimension = self.params.current_dimension()?;
        let target = self.params.target_dimension;
        let mut rng = match self.params.random_seed()? {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let deviation = 1.0 / (target as f64).sqrt();
        let gaussian = Normal::new(0.0, deviation).expect("deviation is positive");
        let matrix =
            Array2::random_using((target, dimension), gaussian, &mut rng).mapv(F::cast);

        let (features, mean) = self.centered_features()?;
        let projection = ProjectingFunction::new(matrix, mean);
        let embedding = projection.matrix().dot(&features).reversed_axes();
        Ok(EmbeddingResult {
            embedding,
            eigenvalues: None,
            projection: Some(projection),
        })
    }

    fn spe(&self) -> Result<EmbeddingResult<F>> {
        let neighbors = if self.params.spe_global_strategy()? {
            None
        } else {
            Some(self.distance_neighbors()?)
        };
        let embedding = spe_embedding(
            self.items,
            self.distance,
            neighbors.as_ref(),
            self.params.target_dimension,
            F::cast(self.params.spe_tolerance()?),
            self.params.spe_num_updates()?,
            self.params.random_seed()?,
            self.ctx,
        )?;
        Ok(EmbeddingResult::plain(embedding))
    }

    fn pass_thru(&self) -> Result<EmbeddingResult<F>> {
        let dimension = self.params.current_dimension()?;
        let features = feature_matrix(self.items, self.feature, dimension);
        Ok(EmbeddingResult::plain(features.reversed_axes()))
    }

    fn factor_analysis(&self) -> Result<EmbeddingResult<F>> {
        let (features, _) = self.centered_features()?;
        let embedding = factor_analysis_embedding(
            &features,
            self.params.target_dimension,
            self.params.max_iteration()?,
            F::cast(self.params.fa_epsilon()?),
            self.params.random_seed()?,
            self.ctx,
        )?;
        Ok(EmbeddingResult::plain(embedding))
    }

    fn tsne(&self) -> Result<EmbeddingResult<F>> {
        let dimension = self.params.current_dimension()?;
        let features = feature_matrix(self.items, self.feature, dimension);
        let embedding = tsne_embedding(
            &features,
            self.params.target_dimension,
            F::cast(self.params.perplexity),
            F::cast(self.params.sne_theta()?),
            self.ctx,
        )?;
        Ok(EmbeddingResult::plain(embedding))
    }
}

/// Classical-MDS style scaling: every coordinate axis is stretched by the
/// square root of its (clamped) eigenvalue.
fn scale_columns_by_sqrt<F: Float>(vectors: &mut Array2<F>, values: &Array1<F>) {
    for (mut column, &value) in vectors.columns_mut().into_iter().zip(values.iter()) {
        let scale = num_traits::Float::sqrt(value.max(F::zero()));
        column.mapv_inplace(|v| v * scale);
    }
}
