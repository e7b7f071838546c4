//! Error Types for Data Sources

use query_core::QueryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}")]
    Status { service: String, status: u16 },

    #[error("{0} is rate limiting requests")]
    Throttled(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// Only HTTP 429 is worth retrying
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

impl From<DataError> for QueryError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Throttled(_) => Self::RateLimited(err.to_string()),
            DataError::Config(msg) => Self::Config(msg),
            other => Self::ExternalApi(other.to_string()),
        }
    }
}
