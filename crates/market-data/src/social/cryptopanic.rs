//! CryptoPanic news client

use async_trait::async_trait;
use query_core::RetryPolicy;
use serde_json::Value;

use super::NewsSource;
use crate::error::Result;
use crate::http::RateLimitedClient;

#[derive(Clone, Debug)]
pub struct CryptoPanicConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for CryptoPanicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cryptopanic.com/api/free/v1".into(),
            api_key: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct CryptoPanicSource {
    url: String,
    api_key: Option<String>,
    client: RateLimitedClient,
}

impl CryptoPanicSource {
    pub fn new(config: &CryptoPanicConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("CRYPTOPANIC_API_KEY not set; cryptoNews will report no data");
        }
        Ok(Self {
            url: format!("{}/posts/", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            client: RateLimitedClient::new("cryptopanic", config.retry, &[])?,
        })
    }
}

#[async_trait]
impl NewsSource for CryptoPanicSource {
    fn name(&self) -> &str {
        "cryptopanic"
    }

    async fn posts(&self, currency: &str) -> Result<Option<Value>> {
        // The token travels as a query parameter, not a header
        let mut query = vec![("public", "true".to_string()), ("currencies", currency.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("auth_token", key.clone()));
        }

        let mut body = self.client.get_json(&self.url, &query).await?;
        Ok(match body.get_mut("results").map(Value::take) {
            Some(Value::Null) | None => None,
            Some(results) => Some(results),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::{fast_policy, serve};
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_posts_query() {
        let app = Router::new().route(
            "/posts/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({"count": 1, "results": [{"title": "BTC up", "query": q}]}))
            }),
        );

        let source = CryptoPanicSource::new(&CryptoPanicConfig {
            base_url: serve(app).await,
            api_key: Some("tok".into()),
            retry: fast_policy(),
        })
        .unwrap();

        let posts = source.posts("BTC").await.unwrap().unwrap();
        assert_eq!(posts[0]["title"], "BTC up");
        assert_eq!(posts[0]["query"]["auth_token"], "tok");
        assert_eq!(posts[0]["query"]["public"], "true");
        assert_eq!(posts[0]["query"]["currencies"], "BTC");
    }
}
