//! # query-runtime
//!
//! Runtime model providers for the query pipeline.
//!
//! ## Providers
//!
//! - **OpenAI-compatible**: OpenAI, Groq and any `/chat/completions` endpoint
//! - **Ollama** (default feature): local inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use query_runtime::{build_router, RuntimeConfig};
//!
//! let router = build_router(&RuntimeConfig::from_env())?;
//! let completion = router.complete("io.net", &messages).await?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;
pub mod openai;
pub mod routes;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use routes::{build_router, HostedModel, RuntimeConfig, GROQ_ROUTE, OLLAMA_ROUTE, OPENAI_ROUTE};

// Re-export core types for convenience
pub use query_core::{LlmProvider, Message, ModelRouter, QueryError, Result, Role};
