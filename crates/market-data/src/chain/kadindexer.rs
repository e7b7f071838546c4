//! Kadindexer GraphQL client

use async_trait::async_trait;
use query_core::RetryPolicy;
use serde_json::{json, Value};

use super::ChainIndexer;
use crate::error::{DataError, Result};
use crate::http::RateLimitedClient;

#[derive(Clone, Debug)]
pub struct KadindexerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for KadindexerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mainnet.kadindexer.io/v0".into(),
            api_key: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct KadindexerClient {
    endpoint: String,
    client: RateLimitedClient,
}

impl KadindexerClient {
    pub fn new(config: &KadindexerConfig) -> Result<Self> {
        let headers: Vec<(&'static str, String)> = config
            .api_key
            .iter()
            .map(|key| ("x-api-key", key.clone()))
            .collect();

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client: RateLimitedClient::new("kadindexer", config.retry, &headers)?,
        })
    }
}

#[async_trait]
impl ChainIndexer for KadindexerClient {
    fn name(&self) -> &str {
        "kadindexer"
    }

    async fn execute(&self, document: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": document, "variables": variables });
        let mut response = self.client.post_json(&self.endpoint, &body).await?;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            let message = errors
                .pointer("/0/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown GraphQL error")
                .to_string();
            tracing::error!(error = %message, "GraphQL query error");
            return Err(DataError::GraphQl(message));
        }

        Ok(response.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}
