//! LunarCrush social data client

use async_trait::async_trait;
use query_core::RetryPolicy;
use serde_json::Value;

use super::SocialDataSource;
use crate::error::Result;
use crate::http::RateLimitedClient;

#[derive(Clone, Debug)]
pub struct LunarCrushConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for LunarCrushConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lunarcrush.com/api4/public".into(),
            api_key: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct LunarCrushSource {
    base_url: String,
    client: RateLimitedClient,
}

impl LunarCrushSource {
    pub fn new(config: &LunarCrushConfig) -> Result<Self> {
        let headers = match &config.api_key {
            Some(key) => vec![("authorization", format!("Bearer {key}"))],
            None => {
                tracing::warn!("LUNARCRUSH_API_KEY not set; social capabilities will report no data");
                Vec::new()
            }
        };

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: RateLimitedClient::new("lunarcrush", config.retry, &headers)?,
        })
    }

    async fn data(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let url = format!("{}/{path}", self.base_url);
        let mut body = self.client.get_json(&url, query).await?;
        Ok(match body.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => None,
            Some(data) => Some(data),
        })
    }
}

#[async_trait]
impl SocialDataSource for LunarCrushSource {
    fn name(&self) -> &str {
        "lunarcrush"
    }

    async fn topic(&self, topic: &str) -> Result<Option<Value>> {
        self.data(&format!("topic/{topic}/v1"), &[]).await
    }

    async fn coin_list(&self, sort: &str, filter: &str, limit: u64) -> Result<Option<Value>> {
        self.data(
            "coins/list/v2",
            &[
                ("sort", sort.to_string()),
                ("filter", filter.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn topic_news(&self, topic: &str) -> Result<Option<Value>> {
        self.data(&format!("topic/{topic}/news/v1"), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::{fast_policy, serve};
    use axum::{
        extract::{Path, Query},
        http::HeaderMap,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_paths_and_bearer_auth() {
        let app = Router::new()
            .route(
                "/topic/{topic}/v1",
                get(|Path(topic): Path<String>, headers: HeaderMap| async move {
                    let auth = headers["authorization"].to_str().unwrap().to_string();
                    Json(json!({"data": {"topic": topic, "auth": auth}}))
                }),
            )
            .route(
                "/coins/list/v2",
                get(|Query(q): Query<HashMap<String, String>>| async move { Json(json!({"data": [q]})) }),
            )
            .route("/topic/{topic}/news/v1", get(|| async { Json(json!({"data": null})) }));

        let source = LunarCrushSource::new(&LunarCrushConfig {
            base_url: serve(app).await,
            api_key: Some("secret".into()),
            retry: fast_policy(),
        })
        .unwrap();

        let topic = source.topic("kadena").await.unwrap().unwrap();
        assert_eq!(topic["topic"], "kadena");
        assert_eq!(topic["auth"], "Bearer secret");

        let list = source.coin_list("galaxy_score", "meme", 5).await.unwrap().unwrap();
        assert_eq!(list[0]["sort"], "galaxy_score");
        assert_eq!(list[0]["filter"], "meme");
        assert_eq!(list[0]["limit"], "5");

        assert!(source.topic_news("kadena").await.unwrap().is_none());
    }
}
