//! Rate-limited HTTP client
//!
//! Every data source owns one [`RateLimitedClient`]: requests are spaced by the
//! client's throttle and HTTP 429 responses are retried with exponential
//! backoff before the error reaches the caller.

use std::time::Duration;

use query_core::client::{retry_with_backoff, RetryPolicy, Throttle};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::error::{DataError, Result};

pub struct RateLimitedClient {
    service: String,
    client: reqwest::Client,
    policy: RetryPolicy,
    throttle: Throttle,
}

impl RateLimitedClient {
    /// `headers` are sent with every request (API keys, mostly)
    pub fn new(
        service: impl Into<String>,
        policy: RetryPolicy,
        headers: &[(&'static str, String)],
    ) -> Result<Self> {
        let service = service.into();

        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| DataError::Config(format!("invalid {name} header for {service}: {e}")))?;
            value.set_sensitive(true);
            default_headers.insert(HeaderName::from_static(name), value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(default_headers)
            .build()
            .map_err(|e| DataError::Config(format!("failed to create HTTP client for {service}: {e}")))?;

        Ok(Self {
            service,
            client,
            throttle: Throttle::new(policy.throttle),
            policy,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(|| self.client.get(url).query(query)).await
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(|| self.client.post(url).json(body)).await
    }

    async fn send<F>(&self, build: F) -> Result<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        retry_with_backoff(&self.policy, DataError::is_retryable, |state| {
            let request = build();
            async move {
                self.throttle.acquire().await;
                tracing::debug!(service = %self.service, attempt = state.attempt, "Sending request");

                let response = request.send().await?;
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(DataError::Throttled(self.service.clone()));
                }
                if !status.is_success() {
                    return Err(DataError::Status {
                        service: self.service.clone(),
                        status: status.as_u16(),
                    });
                }
                Ok(response.json::<Value>().await?)
            }
        })
        .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap as AxumHeaders, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Serve `app` on an ephemeral port and return its base URL
    pub(crate) async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            throttle: Duration::from_millis(2),
            initial_backoff: Duration::from_millis(2),
            max_retries: 3,
            backoff_multiplier: 2,
        }
    }

    #[derive(Default)]
    struct Flaky {
        status_first: Vec<u16>,
        seen: Mutex<Vec<Option<String>>>,
    }

    async fn flaky(State(state): State<Arc<Flaky>>, headers: AxumHeaders) -> (axum::http::StatusCode, Json<Value>) {
        let n = {
            let mut seen = state.seen.lock().unwrap();
            seen.push(headers.get("authorization").and_then(|v| v.to_str().ok()).map(String::from));
            seen.len()
        };
        match state.status_first.get(n - 1) {
            Some(code) => (axum::http::StatusCode::from_u16(*code).unwrap(), Json(json!({}))),
            None => (axum::http::StatusCode::OK, Json(json!({"data": {"ok": n}}))),
        }
    }

    async fn flaky_server(status_first: Vec<u16>) -> (String, Arc<Flaky>) {
        let state = Arc::new(Flaky {
            status_first,
            ..Flaky::default()
        });
        let app = Router::new().route("/data", get(flaky)).with_state(state.clone());
        (serve(app).await, state)
    }

    #[tokio::test]
    async fn test_retries_throttled_then_succeeds() {
        let (base, state) = flaky_server(vec![429, 429]).await;
        let client = RateLimitedClient::new("mobula", fast_policy(), &[("authorization", "key-123".into())]).unwrap();

        let value = client.get_json(&format!("{base}/data"), &[]).await.unwrap();
        assert_eq!(value["data"]["ok"], json!(3));

        let seen = state.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|h| h.as_deref() == Some("key-123")));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (base, state) = flaky_server(vec![429; 10]).await;
        let client = RateLimitedClient::new("kadindexer", fast_policy(), &[]).unwrap();

        let err = client.get_json(&format!("{base}/data"), &[]).await.unwrap_err();
        assert!(matches!(err, DataError::Throttled(_)));
        assert_eq!(state.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (base, state) = flaky_server(vec![500]).await;
        let client = RateLimitedClient::new("lunarcrush", fast_policy(), &[]).unwrap();

        let err = client.get_json(&format!("{base}/data"), &[]).await.unwrap_err();
        assert!(matches!(err, DataError::Status { status: 500, .. }));
        assert_eq!(state.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let result = RateLimitedClient::new("mobula", fast_policy(), &[("authorization", "bad\nkey".into())]);
        assert!(matches!(result, Err(DataError::Config(_))));
    }
}
