//! Mobula market data client

use async_trait::async_trait;
use query_core::RetryPolicy;
use serde_json::Value;

use super::{MarketData, MarketDataSource, TokenMetadata};
use crate::error::Result;
use crate::http::RateLimitedClient;

#[derive(Clone, Debug)]
pub struct MobulaConfig {
    pub base_url: String,
    pub api_key: String,
    pub retry: RetryPolicy,
}

impl MobulaConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.mobula.io/api/1";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct MobulaSource {
    base_url: String,
    client: RateLimitedClient,
}

impl MobulaSource {
    pub fn new(config: &MobulaConfig) -> Result<Self> {
        // Mobula takes the raw key, no scheme
        let client = RateLimitedClient::new("mobula", config.retry, &[("authorization", config.api_key.clone())])?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        self.client.get_json(&url, query).await
    }

    /// `data` member of a response, `None` when absent or null
    fn data(mut body: Value) -> Option<Value> {
        match body.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => None,
            Some(data) => Some(data),
        }
    }
}

#[async_trait]
impl MarketDataSource for MobulaSource {
    fn name(&self) -> &str {
        "mobula"
    }

    async fn market_data(&self, asset: &str) -> Result<Option<MarketData>> {
        let body = self.get("market/data", &[("asset", asset.to_string())]).await?;
        Self::data(body)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    async fn metadata(&self, asset: &str) -> Result<Option<TokenMetadata>> {
        let body = self.get("metadata", &[("asset", asset.to_string())]).await?;
        Self::data(body)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    async fn price_history(&self, asset: &str, from_ms: i64, to_ms: i64) -> Result<Value> {
        let body = self
            .get(
                "market/history",
                &[
                    ("asset", asset.to_string()),
                    ("from", from_ms.to_string()),
                    ("to", to_ms.to_string()),
                ],
            )
            .await?;
        Ok(body
            .pointer("/data/price_history")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn wallet_portfolio(&self, wallets: &[String]) -> Result<Value> {
        let body = self
            .get("wallet/multi-portfolio", &[("wallets", wallets.join(","))])
            .await?;
        Ok(body.pointer("/data/0").cloned().unwrap_or(Value::Null))
    }

    async fn wallet_history(&self, wallets: &[String], from_ms: i64, to_ms: i64) -> Result<Value> {
        self.get(
            "wallet/history",
            &[
                ("wallets", wallets.join(",")),
                ("from", from_ms.to_string()),
                ("to", to_ms.to_string()),
            ],
        )
        .await
    }

    async fn health_check(&self) -> bool {
        match self.market_data("bitcoin").await {
            Ok(data) => data.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Mobula health check failed");
                false
            }
        }
    }
}
