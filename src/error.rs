//! Error types returned by the embedding pipeline

use crate::params::ParameterKey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("wrong type of value for parameter {0}")]
    WrongParameterType(ParameterKey),
    #[error("parameter {key} out of range: {message}")]
    ParameterOutOfRange {
        key: ParameterKey,
        message: String,
    },
    #[error("missing required parameter {0}")]
    MissingParameter(ParameterKey),
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),
    #[error("neighborhood graph is disconnected")]
    GraphDisconnected,
    #[error("eigendecomposition did not converge")]
    EigenFailure,
    #[error("cancelled")]
    Cancelled,
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}

impl Error {
    pub(crate) fn out_of_range(key: ParameterKey, message: impl Into<String>) -> Self {
        Error::ParameterOutOfRange {
            key,
            message: message.into(),
        }
    }
}
