//! Response shape errors

use thiserror::Error;

/// Failure to turn a backend payload into a typed value.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// Envelope said `success: false`
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Envelope said `success: true` but carried no data
    #[error("Response missing data")]
    MissingData,

    /// Payload matched none of the accepted shapes
    #[error("Unexpected response shape: {0}")]
    Unexpected(#[from] serde_json::Error),
}

pub type ShapeResult<T> = Result<T, ShapeError>;
