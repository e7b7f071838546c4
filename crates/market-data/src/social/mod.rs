//! Social and News Sources
//!
//! LunarCrush supplies topic metrics, coin rankings and topic news;
//! CryptoPanic supplies headline news per currency.

mod cryptopanic;
mod lunarcrush;

pub use cryptopanic::{CryptoPanicConfig, CryptoPanicSource};
pub use lunarcrush::{LunarCrushConfig, LunarCrushSource};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Social metrics provider. `Ok(None)` means the provider answered without data.
#[async_trait]
pub trait SocialDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Aggregated social metrics for one topic (lowercase token name)
    async fn topic(&self, topic: &str) -> Result<Option<Value>>;

    /// Coin list sorted by `sort`, restricted to category `filter` (empty for all)
    async fn coin_list(&self, sort: &str, filter: &str, limit: u64) -> Result<Option<Value>>;

    async fn topic_news(&self, topic: &str) -> Result<Option<Value>>;
}

/// Headline news provider
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Public posts mentioning `currency`
    async fn posts(&self, currency: &str) -> Result<Option<Value>>;
}
