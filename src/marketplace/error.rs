use thiserror::Error;

use crate::store::StoreError;

/// Business-rule failures are deterministic and surfaced verbatim. Only
/// `Store` reflects an infrastructure problem.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl MarketError {
    pub fn not_found(message: impl Into<String>) -> Self {
        MarketError::NotFound(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        MarketError::InvalidState(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        MarketError::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        MarketError::Conflict(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MarketError::InvalidArgument(message.into())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
