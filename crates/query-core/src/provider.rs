//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM backends (OpenAI-compatible HTTP
//! endpoints, Ollama, ...) and a static route table that maps the model
//! identifier a caller asks for onto a concrete provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use query_core::provider::{ModelRouter, ModelRoute};
//!
//! let mut router = ModelRouter::new("io.net");
//! router.register(route, Arc::new(provider));
//!
//! let completion = router.complete("io.net", &messages).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::message::Message;

/// How a route caps the length of generated output.
///
/// Providers disagree on the parameter name (reasoning models only accept
/// `max_completion_tokens`), so the choice is made per route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tokens")]
pub enum OutputLimit {
    #[default]
    Unbounded,
    MaxTokens(u32),
    MaxCompletionTokens(u32),
}

impl OutputLimit {
    /// Token cap regardless of how it is spelled on the wire
    pub const fn tokens(self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::MaxTokens(n) | Self::MaxCompletionTokens(n) => Some(n),
        }
    }
}

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Provider-side model name (e.g., "o3-mini", "llama3.2")
    pub model: String,

    /// Temperature for sampling; `None` leaves the provider default
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Output length cap
    #[serde(default)]
    pub output_limit: OutputLimit,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: None,
            output_limit: OutputLimit::MaxTokens(2048),
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            _ => Self::Error,
        }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The pipeline works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;
}

/// Backend family behind a route
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/chat/completions` over HTTP (OpenAI, Groq, ...)
    OpenAiCompatible,
    /// Local Ollama daemon
    Ollama,
}

/// Static description of one selectable model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelRoute {
    /// Identifier callers pass as `model`
    pub id: String,

    /// Backend family
    pub kind: ProviderKind,

    /// Endpoint the provider talks to
    pub endpoint: String,

    /// Provider-side model name
    pub model: String,

    /// Output length policy for this route
    #[serde(default)]
    pub output_limit: OutputLimit,

    /// Sampling temperature, if the route accepts one
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ModelRoute {
    /// Generation options derived from the route
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            output_limit: self.output_limit,
        }
    }
}

/// A route bound to the provider that serves it
#[derive(Clone)]
pub struct RoutedModel {
    pub route: ModelRoute,
    pub provider: Arc<dyn LlmProvider>,
}

/// Read-only route table, built once at start-up.
pub struct ModelRouter {
    routes: BTreeMap<String, RoutedModel>,
    default_route: String,
}

impl ModelRouter {
    pub fn new(default_route: impl Into<String>) -> Self {
        Self {
            routes: BTreeMap::new(),
            default_route: default_route.into(),
        }
    }

    /// Register a route (replaces any route with the same id)
    pub fn register(&mut self, route: ModelRoute, provider: Arc<dyn LlmProvider>) {
        self.routes
            .insert(route.id.clone(), RoutedModel { route, provider });
    }

    /// Identifier used when a request names no model
    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// Route ids in stable order
    pub fn route_ids(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    /// All routes in stable order
    pub fn routes(&self) -> impl Iterator<Item = &RoutedModel> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve a requested model id, falling back to the default route
    pub fn resolve(&self, model: Option<&str>) -> Result<&RoutedModel> {
        let id = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_route);

        self.routes.get(id).ok_or_else(|| {
            QueryError::Validation(format!(
                "Unsupported model: {id} (available: {})",
                self.route_ids().join(", ")
            ))
        })
    }

    /// Send messages through the named route
    pub async fn complete(&self, model: &str, messages: &[Message]) -> Result<Completion> {
        let routed = self.resolve(Some(model))?;
        tracing::debug!(
            route = %routed.route.id,
            provider = routed.provider.name(),
            model = %routed.route.model,
            "Dispatching completion"
        );
        routed
            .provider
            .complete(messages, &routed.route.generation_options())
            .await
    }
}
