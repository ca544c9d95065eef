//! Parameter map with typed, range-checked access
//!
//! The public surface is a map from [`ParameterKey`] to a dynamically typed
//! [`ParameterValue`]; this is the boundary where host applications hand
//! over untyped configuration. Access from the inside goes through
//! [`ResolvedParams`], which applies the documented defaults, checks ranges
//! and reports `WrongParameterType` / `ParameterOutOfRange` /
//! `MissingParameter` with the offending key.

use std::collections::HashMap;
use std::fmt;

use crate::dispatch::MethodId;
use crate::eigen::EigenEmbeddingMethodId;
use crate::error::{Error, Result};
use crate::neighbors::NeighborsMethodId;

/// Recognized parameter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKey {
    Method,
    EigenEmbeddingMethod,
    NeighborsMethod,
    NumberOfNeighbors,
    TargetDimension,
    CurrentDimension,
    GaussianKernelWidth,
    DiffusionMapTimesteps,
    NullspaceShift,
    KlleShift,
    MaxIteration,
    SpeTolerance,
    SpeNumberOfUpdates,
    SpeGlobalStrategy,
    SnePerplexity,
    SneTheta,
    LandmarkRatio,
    CheckConnectivity,
    FaEpsilon,
    RandomSeed,
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKey::Method => "method",
            ParameterKey::EigenEmbeddingMethod => "eigen embedding method",
            ParameterKey::NeighborsMethod => "neighbors method",
            ParameterKey::NumberOfNeighbors => "number of neighbors",
            ParameterKey::TargetDimension => "target dimension",
            ParameterKey::CurrentDimension => "current dimension",
            ParameterKey::GaussianKernelWidth => "gaussian kernel width",
            ParameterKey::DiffusionMapTimesteps => "diffusion map timesteps",
            ParameterKey::NullspaceShift => "nullspace shift",
            ParameterKey::KlleShift => "klle shift",
            ParameterKey::MaxIteration => "maximum iterations",
            ParameterKey::SpeTolerance => "spe tolerance",
            ParameterKey::SpeNumberOfUpdates => "spe number of updates",
            ParameterKey::SpeGlobalStrategy => "spe global strategy",
            ParameterKey::SnePerplexity => "sne perplexity",
            ParameterKey::SneTheta => "sne theta",
            ParameterKey::LandmarkRatio => "landmark ratio",
            ParameterKey::CheckConnectivity => "check connectivity",
            ParameterKey::FaEpsilon => "fa epsilon",
            ParameterKey::RandomSeed => "random seed",
        };
        f.write_str(name)
    }
}

/// Dynamically typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Index(usize),
    Scalar(f64),
    Boolean(bool),
    Method(MethodId),
    EigenMethod(EigenEmbeddingMethodId),
    NeighborsMethod(NeighborsMethodId),
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Index(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<MethodId> for ParameterValue {
    fn from(value: MethodId) -> Self {
        ParameterValue::Method(value)
    }
}

impl From<EigenEmbeddingMethodId> for ParameterValue {
    fn from(value: EigenEmbeddingMethodId) -> Self {
        ParameterValue::EigenMethod(value)
    }
}

impl From<NeighborsMethodId> for ParameterValue {
    fn from(value: NeighborsMethodId) -> Self {
        ParameterValue::NeighborsMethod(value)
    }
}

/// Configuration handed to [`crate::embed`].
///
/// ```
/// use unfold::{MethodId, ParameterKey, Parameters};
///
/// let params = Parameters::new()
///     .set(ParameterKey::Method, MethodId::Pca)
///     .set(ParameterKey::TargetDimension, 2usize)
///     .set(ParameterKey::CurrentDimension, 4usize);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: HashMap<ParameterKey, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, builder style.
    pub fn set(mut self, key: ParameterKey, value: impl Into<ParameterValue>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: ParameterKey) -> Option<&ParameterValue> {
        self.values.get(&key)
    }

    fn index(&self, key: ParameterKey) -> Result<Option<usize>> {
        match self.values.get(&key) {
            None => Ok(None),
            Some(ParameterValue::Index(value)) => Ok(Some(*value)),
            Some(_) => Err(Error::WrongParameterType(key)),
        }
    }

    fn scalar(&self, key: ParameterKey) -> Result<Option<f64>> {
        match self.values.get(&key) {
            None => Ok(None),
            Some(ParameterValue::Scalar(value)) => Ok(Some(*value)),
            Some(_) => Err(Error::WrongParameterType(key)),
        }
    }

    fn boolean(&self, key: ParameterKey) -> Result<Option<bool>> {
        match self.values.get(&key) {
            None => Ok(None),
            Some(ParameterValue::Boolean(value)) => Ok(Some(*value)),
            Some(_) => Err(Error::WrongParameterType(key)),
        }
    }

    pub(crate) fn method(&self) -> Result<MethodId> {
        match self.values.get(&ParameterKey::Method) {
            None => Err(Error::MissingParameter(ParameterKey::Method)),
            Some(ParameterValue::Method(value)) => Ok(*value),
            Some(_) => Err(Error::WrongParameterType(ParameterKey::Method)),
        }
    }
}

/// Parameters resolved against a dataset of `n_vectors` items: defaults
/// filled in, ranges enforced. Method-specific keys stay lazy so that a
/// missing `SneTheta` only fails a t-SNE run.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedParams {
    map: Parameters,
    pub n_vectors: usize,
    pub target_dimension: usize,
    pub eigen_method: EigenEmbeddingMethodId,
    pub neighbors_method: NeighborsMethodId,
    pub check_connectivity: bool,
    pub width: f64,
    pub timesteps: usize,
    pub eigenshift: f64,
    pub traceshift: f64,
    pub ratio: f64,
    pub perplexity: f64,
}

impl ResolvedParams {
    pub fn resolve(map: &Parameters, n_vectors: usize) -> Result<Self> {
        use ParameterKey::*;

        let target_dimension = map.index(TargetDimension)?.unwrap_or(2);
        if target_dimension < 1 || target_dimension > n_vectors {
            return Err(Error::out_of_range(
                TargetDimension,
                format!("{} not in [1, {}]", target_dimension, n_vectors),
            ));
        }

        let default_perplexity = 30.0f64.min((n_vectors.saturating_sub(1)) as f64 / 3.0);
        let perplexity = map.scalar(SnePerplexity)?.unwrap_or(default_perplexity);
        let perplexity_limit = (n_vectors.saturating_sub(1)) as f64 / 3.0;
        if n_vectors > 1 && (perplexity <= 0.0 || perplexity > perplexity_limit) {
            return Err(Error::out_of_range(
                SnePerplexity,
                format!("{} not in (0, {}]", perplexity, perplexity_limit),
            ));
        }

        let ratio = map.scalar(LandmarkRatio)?.unwrap_or(0.5);
        if n_vectors > 1 && !(1.0 / n_vectors as f64..=1.0).contains(&ratio) {
            return Err(Error::out_of_range(
                LandmarkRatio,
                format!("{} not in [1/{}, 1]", ratio, n_vectors),
            ));
        }

        let width = map.scalar(GaussianKernelWidth)?.unwrap_or(1.0);
        if width <= 0.0 {
            return Err(Error::out_of_range(GaussianKernelWidth, "must be positive"));
        }

        let timesteps = map.index(DiffusionMapTimesteps)?.unwrap_or(1);
        if timesteps < 1 {
            return Err(Error::out_of_range(DiffusionMapTimesteps, "must be positive"));
        }

        let eigenshift = map.scalar(NullspaceShift)?.unwrap_or(1e-9);
        if eigenshift <= 0.0 {
            return Err(Error::out_of_range(NullspaceShift, "must be positive"));
        }

        let traceshift = map.scalar(KlleShift)?.unwrap_or(1e-3);
        if traceshift <= 0.0 {
            return Err(Error::out_of_range(KlleShift, "must be positive"));
        }

        let eigen_method = match map.get(EigenEmbeddingMethod) {
            None => EigenEmbeddingMethodId::Arpack,
            Some(ParameterValue::EigenMethod(value)) => *value,
            Some(_) => return Err(Error::WrongParameterType(EigenEmbeddingMethod)),
        };

        let neighbors_method = match map.get(NeighborsMethod) {
            None => NeighborsMethodId::CoverTree,
            Some(ParameterValue::NeighborsMethod(value)) => *value,
            Some(_) => return Err(Error::WrongParameterType(NeighborsMethod)),
        };

        let check_connectivity = map.boolean(CheckConnectivity)?.unwrap_or(true);

        Ok(ResolvedParams {
            map: map.clone(),
            n_vectors,
            target_dimension,
            eigen_method,
            neighbors_method,
            check_connectivity,
            width,
            timesteps,
            eigenshift,
            traceshift,
            ratio,
            perplexity,
        })
    }

    fn required_index(&self, key: ParameterKey) -> Result<usize> {
        self.map
            .index(key)?
            .ok_or(Error::MissingParameter(key))
    }

    fn required_scalar(&self, key: ParameterKey) -> Result<f64> {
        self.map
            .scalar(key)?
            .ok_or(Error::MissingParameter(key))
    }

    pub fn n_neighbors(&self) -> Result<usize> {
        let k = self.required_index(ParameterKey::NumberOfNeighbors)?;
        if k < 3 || k >= self.n_vectors {
            return Err(Error::out_of_range(
                ParameterKey::NumberOfNeighbors,
                format!("{} not in [3, {})", k, self.n_vectors),
            ));
        }
        Ok(k)
    }

    pub fn current_dimension(&self) -> Result<usize> {
        let dimension = self.required_index(ParameterKey::CurrentDimension)?;
        if dimension < 1 {
            return Err(Error::out_of_range(ParameterKey::CurrentDimension, "must be positive"));
        }
        Ok(dimension)
    }

    pub fn max_iteration(&self) -> Result<usize> {
        let iterations = self.required_index(ParameterKey::MaxIteration)?;
        if iterations < 1 {
            return Err(Error::out_of_range(ParameterKey::MaxIteration, "must be positive"));
        }
        Ok(iterations)
    }

    pub fn spe_tolerance(&self) -> Result<f64> {
        let tolerance = self.required_scalar(ParameterKey::SpeTolerance)?;
        if tolerance <= 0.0 {
            return Err(Error::out_of_range(ParameterKey::SpeTolerance, "must be positive"));
        }
        Ok(tolerance)
    }

    pub fn spe_num_updates(&self) -> Result<usize> {
        let updates = self.required_index(ParameterKey::SpeNumberOfUpdates)?;
        if updates < 1 {
            return Err(Error::out_of_range(
                ParameterKey::SpeNumberOfUpdates,
                "must be positive",
            ));
        }
        Ok(updates)
    }

    pub fn spe_global_strategy(&self) -> Result<bool> {
        Ok(self.map.boolean(ParameterKey::SpeGlobalStrategy)?.unwrap_or(true))
    }

    pub fn sne_theta(&self) -> Result<f64> {
        let theta = self.required_scalar(ParameterKey::SneTheta)?;
        if theta <= 0.0 {
            return Err(Error::out_of_range(ParameterKey::SneTheta, "must be positive"));
        }
        Ok(theta)
    }

    pub fn fa_epsilon(&self) -> Result<f64> {
        let epsilon = self.required_scalar(ParameterKey::FaEpsilon)?;
        if epsilon <= 0.0 {
            return Err(Error::out_of_range(ParameterKey::FaEpsilon, "must be positive"));
        }
        Ok(epsilon)
    }

    pub fn random_seed(&self) -> Result<Option<u64>> {
        Ok(self.map.index(ParameterKey::RandomSeed)?.map(|seed| seed as u64))
    }
}
