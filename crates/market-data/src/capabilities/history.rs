//! Price history and wallet capabilities

use async_trait::async_trait;
use chrono::Utc;
use query_core::{ArgReader, Capability, CapabilitySchema, ParameterSchema, QueryError, Result};
use serde_json::Value;

use super::{period_arg, period_param, token_param};
use crate::config::DataSources;

/// `[now - period, now]` in epoch milliseconds
fn window(period_ms: u64) -> (i64, i64) {
    let now = Utc::now().timestamp_millis();
    let span = i64::try_from(period_ms).unwrap_or(i64::MAX);
    (now.saturating_sub(span), now)
}

pub struct PriceHistory {
    sources: DataSources,
}

impl PriceHistory {
    pub const NAME: &'static str = "priceHistory";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for PriceHistory {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns the price series [[timestampMs, priceUsd], ...] over the period".into(),
            parameters: vec![token_param(), period_param()],
            category: Some("History & Wallets".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let reader = ArgReader::new(Self::NAME, args);
        let asset = self.sources.tokens.normalize(&reader.string(0)?);
        let (from, to) = window(period_arg(&reader, Self::NAME, 1)?);
        Ok(self.sources.market.price_history(&asset, from, to).await?)
    }
}

pub struct WalletPortfolio {
    sources: DataSources,
}

impl WalletPortfolio {
    pub const NAME: &'static str = "walletPortfolio";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for WalletPortfolio {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns detailed wallet holdings and balance".into(),
            parameters: vec![ParameterSchema::required(
                "address",
                "string | array",
                "Wallet address, or an array of addresses such as {\"$const\": \"portfolioAddresses\"}",
            )],
            category: Some("History & Wallets".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let wallets: Vec<String> = match args.first() {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(String::from).collect(),
            _ => vec![ArgReader::new(Self::NAME, args).string(0)?],
        };

        if wallets.is_empty() {
            return Err(QueryError::InvalidArguments {
                capability: Self::NAME.into(),
                message: "at least one wallet address is required".into(),
            });
        }

        Ok(self.sources.market.wallet_portfolio(&wallets).await?)
    }
}

/// Balance history of the configured portfolio wallets
pub struct HistoricPortfolio {
    sources: DataSources,
}

impl HistoricPortfolio {
    pub const NAME: &'static str = "historicPortfolio";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for HistoricPortfolio {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns {wallet, wallets, currentBalance, balanceHistory} for the user's wallets over the period".into(),
            parameters: vec![period_param()],
            category: Some("History & Wallets".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let reader = ArgReader::new(Self::NAME, args);
        let (from, to) = window(period_arg(&reader, Self::NAME, 0)?);
        Ok(self
            .sources
            .market
            .wallet_history(&self.sources.portfolio_addresses, from, to)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::offline_sources;
    use serde_json::json;

    #[tokio::test]
    async fn test_price_history_window() {
        let capability = PriceHistory::new(offline_sources());

        let week = capability.invoke(&[json!("ETH"), json!("7d")]).await.unwrap();
        assert_eq!(week.as_array().unwrap().len(), 8);

        let by_millis = capability.invoke(&[json!("ETH"), json!(86_400_000)]).await.unwrap();
        assert_eq!(by_millis.as_array().unwrap().len(), 2);

        let err = capability.invoke(&[json!("ETH"), json!("2w")]).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_wallet_portfolio_accepts_address_or_list() {
        let capability = WalletPortfolio::new(offline_sources());

        let single = capability.invoke(&[json!("0x123")]).await.unwrap();
        assert_eq!(single["wallets"], json!(["0x123"]));

        let many = capability.invoke(&[json!(["0xabc", "0xdef"])]).await.unwrap();
        assert_eq!(many["wallets"], json!(["0xabc", "0xdef"]));

        assert!(capability.invoke(&[json!([])]).await.is_err());
    }

    #[tokio::test]
    async fn test_historic_portfolio_uses_configured_wallets() {
        let capability = HistoricPortfolio::new(offline_sources());
        let history = capability.invoke(&[json!("30d")]).await.unwrap();
        assert_eq!(history["data"]["wallets"], json!(["0xabc", "0xdef"]));
    }
}
