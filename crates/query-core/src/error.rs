//! Error Types

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum QueryError {
    /// Missing or malformed request input, reported before any stage runs
    #[error("Validation error: {0}")]
    Validation(String),

    /// The model produced no usable program text
    #[error("Compile error: {0}")]
    Compile(String),

    /// The generated program failed inside the sandbox
    #[error("Execution error: {0}")]
    Execution(String),

    /// External call throttled (retryable)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other external data-source failure
    #[error("External API error: {0}")]
    ExternalApi(String),

    /// The insight model call failed or returned nothing
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Capability not found in registry
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    /// Capability arguments rejected
    #[error("Invalid arguments for {capability}: {message}")]
    InvalidArguments { capability: String, message: String },

    /// Call plan could not be parsed or failed validation
    #[error("Program error: {0}")]
    Program(String),

    /// Call plan exceeded its call count or time budget
    #[error("Execution budget exceeded: {0}")]
    BudgetExceeded(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Fatal errors abort the request; everything else degrades in place
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Compile(_))
    }

    /// Short machine-readable kind, surfaced as `error.details`
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Compile(_) => "compile",
            Self::Execution(_)
            | Self::CapabilityNotFound(_)
            | Self::InvalidArguments { .. }
            | Self::Program(_)
            | Self::BudgetExceeded(_) => "execution",
            Self::RateLimited(_) => "rate_limited",
            Self::ExternalApi(_) => "external_api",
            Self::Synthesis(_) => "synthesis",
            Self::Provider(_) | Self::ProviderUnavailable(_) => "provider",
            Self::Config(_) => "config",
            Self::Json(_) | Self::Other(_) => "internal",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => format!("Invalid request: {msg}"),
            Self::Compile(_) => "Failed to generate a data query for this question.".into(),
            Self::Execution(msg) => format!("Data fetching failed: {msg}"),
            Self::RateLimited(_) => "A data source is rate limiting requests. Please wait a moment.".into(),
            Self::ExternalApi(_) => "A data source is currently unavailable.".into(),
            Self::Synthesis(_) => "Analysis could not be generated at this time.".into(),
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::CapabilityNotFound(name) => format!("The function '{name}' is not available."),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limits_retry() {
        assert!(QueryError::RateLimited("429".into()).is_retryable());
        assert!(!QueryError::ExternalApi("500".into()).is_retryable());
        assert!(!QueryError::Provider("boom".into()).is_retryable());
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(QueryError::Validation("no query".into()).is_fatal());
        assert!(QueryError::Compile("empty".into()).is_fatal());
        assert!(!QueryError::Execution("threw".into()).is_fatal());
        assert!(!QueryError::Synthesis("empty".into()).is_fatal());
        assert_eq!(QueryError::Program("bad".into()).kind(), "execution");
    }
}
