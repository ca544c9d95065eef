//! `unfold` is a library of nonlinear dimensionality reduction methods
//! behind a single dispatching entry point.
//!
//! Given a slice of opaque items and callbacks delivering kernel values,
//! distances and feature vectors, [`embed`] produces a low-dimensional
//! embedding that preserves the geometric property the chosen method cares
//! about: local linear reconstructions (LLE and friends), geodesic
//! distances (Isomap), diffusion geometry, spectral locality (Laplacian
//! eigenmaps) or plain variance (PCA). Methods are selected by a
//! [`MethodId`] in the parameter map, so one call site can drive the whole
//! family:
//!
//! ```
//! use ndarray::ArrayViewMut1;
//! use unfold::{embed, Context, MethodId, ParameterKey, Parameters};
//!
//! // four points on a line, described only through callbacks
//! let items: Vec<[f64; 2]> = (0..4).map(|i| [i as f64, 0.0]).collect();
//! let kernel = |a: &[f64; 2], b: &[f64; 2]| a[0] * b[0] + a[1] * b[1];
//! let distance = |a: &[f64; 2], b: &[f64; 2]| {
//!     ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
//! };
//! fn feature(item: &[f64; 2], mut out: ArrayViewMut1<f64>) {
//!     out[0] = item[0];
//!     out[1] = item[1];
//! }
//!
//! let parameters = Parameters::new()
//!     .set(ParameterKey::Method, MethodId::Pca)
//!     .set(ParameterKey::TargetDimension, 1usize)
//!     .set(ParameterKey::CurrentDimension, 2usize);
//!
//! let result = embed::<f64, _, _, _, _>(
//!     &items, &kernel, &distance, &feature, &parameters, &Context::new(),
//! ).unwrap();
//! assert_eq!(result.embedding.dim(), (4, 1));
//! ```
//!
//! The linear methods additionally return a [`ProjectingFunction`] that
//! maps unseen feature vectors into the embedding space. Progress and
//! cancellation flow through [`Context`]; every error surfaces as a
//! variant of [`Error`], never as a partial result.

mod callbacks;
mod context;
mod dispatch;
mod eigen;
mod error;
mod fa;
mod float;
mod landmarks;
mod neighbors;
mod params;
mod projection;
mod spe;
mod tsne;
mod weights;

pub use callbacks::{DistanceCallback, FeatureCallback, KernelCallback};
pub use context::Context;
pub use dispatch::{embed, EmbeddingResult, MethodId};
pub use eigen::EigenEmbeddingMethodId;
pub use error::{Error, Result};
pub use float::Float;
pub use neighbors::{LocalNeighbors, Neighbors, NeighborsMethodId};
pub use params::{ParameterKey, ParameterValue, Parameters};
pub use projection::ProjectingFunction;
