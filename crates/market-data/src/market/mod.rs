//! Market Data Sources
//!
//! Quotes, token metadata, price history and wallet data. Implement
//! [`MarketDataSource`] per provider: Mobula in production, the mock for
//! offline use and tests.

mod mobula;
mod mock;

pub use mobula::{MobulaConfig, MobulaSource};
pub use mock::MockMarketSource;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::format::lenient_decimal;

/// Market snapshot for one asset. Every field is optional: providers omit
/// what they do not track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub market_cap: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub market_cap_diluted: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub liquidity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub liquidity_change_24h: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub off_chain_volume: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume_7d: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume_change_24h: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price_change_1h: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price_change_24h: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price_change_7d: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price_change_1m: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price_change_1y: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ath: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub atl: Option<Decimal>,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total_supply: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub circulating_supply: Option<Decimal>,
}

/// Centralized exchange listing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CexListing {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Investor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub lead: Option<bool>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DistributionShare {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub percentage: Option<Value>,
}

/// One token unlock event; `unlock_date` is epoch milliseconds or an ISO string
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UnlockEvent {
    #[serde(default)]
    pub unlock_date: Value,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub tokens_to_unlock: Option<Decimal>,
    #[serde(default)]
    pub allocation_details: Value,
}

/// Project metadata. Lists are `None` when the provider has no data.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub discord: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cexs: Option<Vec<CexListing>>,
    #[serde(default)]
    pub investors: Option<Vec<Investor>>,
    #[serde(default)]
    pub distribution: Option<Vec<DistributionShare>>,
    #[serde(default)]
    pub release_schedule: Option<Vec<UnlockEvent>>,
}

/// Market data source trait (Strategy pattern)
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name for logs and health reports
    fn name(&self) -> &str;

    /// Current market snapshot; `None` when the asset is not listed
    async fn market_data(&self, asset: &str) -> Result<Option<MarketData>>;

    async fn metadata(&self, asset: &str) -> Result<Option<TokenMetadata>>;

    /// Price points between two epoch-millisecond timestamps
    async fn price_history(&self, asset: &str, from_ms: i64, to_ms: i64) -> Result<Value>;

    async fn wallet_portfolio(&self, wallets: &[String]) -> Result<Value>;

    /// Balance history for the given wallets between two epoch-millisecond timestamps
    async fn wallet_history(&self, wallets: &[String], from_ms: i64, to_ms: i64) -> Result<Value>;

    /// Check if the source is reachable
    async fn health_check(&self) -> bool;
}
