//! OpenAI-compatible Chat Provider
//!
//! Implementation of `LlmProvider` for any `/chat/completions` endpoint
//! (OpenAI, Groq, io.net, LM Studio, ...).

use std::time::Duration;

use async_trait::async_trait;
use query_core::{
    client::{retry_with_backoff, RetryPolicy, Throttle},
    error::{QueryError, Result},
    message::Message,
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, OutputLimit, TokenUsage},
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

/// Connection settings for one endpoint
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Bearer token; requests go out unauthenticated without one
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Throttle and 429 backoff
    pub retry: RetryPolicy,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            timeout_secs: 120,
            retry: RetryPolicy::none(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    config: OpenAiConfig,
    throttle: Throttle,
}

impl OpenAiProvider {
    pub fn new(name: impl Into<String>, config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            client,
            throttle: Throttle::new(config.retry.throttle),
            config,
        })
    }

    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Resolve the chat completions endpoint from the base URL
    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn request_body(messages: &[Message], options: &GenerationOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": messages,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        match options.output_limit {
            OutputLimit::Unbounded => {}
            OutputLimit::MaxTokens(n) => body["max_tokens"] = json!(n),
            OutputLimit::MaxCompletionTokens(n) => body["max_completion_tokens"] = json!(n),
        }
        body
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send_once(&self, body: &Value) -> Result<ChatResponse> {
        self.throttle.acquire().await;

        let response = self
            .authorize(self.client.post(self.endpoint()).json(body))
            .send()
            .await
            .map_err(|e| QueryError::ProviderUnavailable(format!("{}: {e}", self.name)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(QueryError::RateLimited(format!("{} returned 429", self.name)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QueryError::Provider(format!("{} returned {status}: {text}", self.name)));
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::Provider(format!("{}: invalid response body: {e}", self.name)))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool> {
        let base = self.config.base_url.trim_end_matches('/');
        let url = format!("{}/models", base.trim_end_matches("/chat/completions"));

        match self.authorize(self.client.get(url)).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                tracing::warn!(provider = %self.name, status = %response.status(), "Health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "Health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let body = Self::request_body(messages, options);

        let response = retry_with_backoff(&self.config.retry, QueryError::is_retryable, |_| {
            self.send_once(&body)
        })
        .await?;

        let choice = response.choices.into_iter().next();
        let finish_reason = choice
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .map(FinishReason::parse);
        let content = choice.and_then(|c| c.message.content).unwrap_or_default();

        Ok(Completion {
            content,
            model: response.model.unwrap_or_else(|| options.model.clone()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Upstream {
        throttle_first: usize,
        requests: Mutex<Vec<(Option<String>, Value)>>,
        arrivals: Mutex<Vec<std::time::Instant>>,
    }

    async fn chat(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        upstream.arrivals.lock().unwrap().push(std::time::Instant::now());
        let seen = {
            let mut requests = upstream.requests.lock().unwrap();
            requests.push((auth, body));
            requests.len()
        };
        if seen <= upstream.throttle_first {
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "model": "o3-mini-2025-01-31",
                "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
            })),
        )
    }

    async fn spawn(upstream: Arc<Upstream>) -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(chat))
            .with_state(upstream);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn options(limit: OutputLimit) -> GenerationOptions {
        GenerationOptions {
            model: "o3-mini".into(),
            temperature: None,
            output_limit: limit,
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        let with = |base: &str| {
            OpenAiProvider::new("t", OpenAiConfig { base_url: base.into(), ..OpenAiConfig::default() })
                .unwrap()
                .endpoint()
        };
        assert_eq!(with("https://api.groq.com/openai/v1"), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(with("http://localhost:1234/"), "http://localhost:1234/v1/chat/completions");
        assert_eq!(with("http://x/v1/chat/completions"), "http://x/v1/chat/completions");
    }

    #[test]
    fn test_output_limit_spelling() {
        let messages = [Message::user("hi")];
        let body = OpenAiProvider::request_body(&messages, &options(OutputLimit::MaxCompletionTokens(4096)));
        assert_eq!(body["max_completion_tokens"], json!(4096));
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));

        let body = OpenAiProvider::request_body(&messages, &options(OutputLimit::MaxTokens(2048)));
        assert_eq!(body["max_tokens"], json!(2048));
        assert!(body.get("max_completion_tokens").is_none());

        let body = OpenAiProvider::request_body(&messages, &options(OutputLimit::Unbounded));
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_complete_retries_throttled_requests() {
        let upstream = Arc::new(Upstream {
            throttle_first: 2,
            ..Upstream::default()
        });
        let base_url = spawn(upstream.clone()).await;
        let provider = OpenAiProvider::new(
            "openai",
            OpenAiConfig {
                base_url,
                api_key: Some("sk-test".into()),
                timeout_secs: 5,
                retry: RetryPolicy {
                    throttle: Duration::ZERO,
                    initial_backoff: Duration::from_millis(20),
                    max_retries: 3,
                    backoff_multiplier: 2,
                },
            },
        )
        .unwrap();

        let completion = provider
            .complete(&[Message::user("hi")], &options(OutputLimit::MaxCompletionTokens(4096)))
            .await
            .unwrap();

        assert_eq!(completion.content, "hello");
        assert_eq!(completion.model, "o3-mini-2025-01-31");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 6);

        let requests = upstream.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].0.as_deref(), Some("Bearer sk-test"));
        assert_eq!(requests[2].1["max_completion_tokens"], json!(4096));

        // No throttle on this route, yet retries still wait 20ms then 40ms.
        let arrivals = upstream.arrivals.lock().unwrap();
        assert!(arrivals[1] - arrivals[0] >= Duration::from_millis(20));
        assert!(arrivals[2] - arrivals[1] >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_throttling_past_budget_is_rate_limited() {
        let upstream = Arc::new(Upstream {
            throttle_first: usize::MAX,
            ..Upstream::default()
        });
        let base_url = spawn(upstream.clone()).await;
        let provider = OpenAiProvider::new(
            "groq",
            OpenAiConfig {
                base_url,
                retry: RetryPolicy {
                    throttle: Duration::from_millis(1),
                    initial_backoff: Duration::from_millis(1),
                    max_retries: 1,
                    backoff_multiplier: 2,
                },
                ..OpenAiConfig::default()
            },
        )
        .unwrap();

        let err = provider
            .complete(&[Message::user("hi")], &options(OutputLimit::MaxTokens(16)))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::RateLimited(_)));
        assert_eq!(upstream.requests.lock().unwrap().len(), 2);
        assert!(upstream.requests.lock().unwrap()[0].0.is_none());
    }
}
