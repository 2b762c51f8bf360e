//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum ForesightError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Invalid configuration, detected before any sampling or training.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Array dimensions do not agree with the model or with each other.
    #[error("Dimension error: {0}")]
    Dimension(String),

    /// Not enough data to fulfil the request.
    #[error("Data error: {0}")]
    Data(String),

    /// A numerical routine failed, e.g., a Cholesky factorization.
    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl ForesightError {
    /// Boxes a [`ForesightError::Config`].
    pub fn config(msg: impl Into<String>) -> anyhow::Error {
        Self::Config(msg.into()).into()
    }

    pub fn dimension(msg: impl Into<String>) -> anyhow::Error {
        Self::Dimension(msg.into()).into()
    }

    pub fn data(msg: impl Into<String>) -> anyhow::Error {
        Self::Data(msg.into()).into()
    }
}
