//! Data source configuration
//!
//! Read once at start-up from the environment and turned into a
//! [`DataSources`] bundle shared by every capability.

use std::path::PathBuf;
use std::sync::Arc;

use query_core::RetryPolicy;

use crate::chain::{ChainIndexer, KadindexerClient, KadindexerConfig};
use crate::error::Result;
use crate::market::{MarketDataSource, MobulaConfig, MobulaSource, MockMarketSource};
use crate::social::{
    CryptoPanicConfig, CryptoPanicSource, LunarCrushConfig, LunarCrushSource, NewsSource, SocialDataSource,
};
use crate::tokens::TokenTable;

pub const DEFAULT_PORTFOLIO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Clone, Debug)]
pub struct DataConfig {
    /// `None` selects the offline mock market source
    pub mobula: Option<MobulaConfig>,
    pub lunarcrush: LunarCrushConfig,
    pub cryptopanic: CryptoPanicConfig,
    pub kadindexer: KadindexerConfig,
    pub portfolio_addresses: Vec<String>,
    pub coins_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            mobula: None,
            lunarcrush: LunarCrushConfig::default(),
            cryptopanic: CryptoPanicConfig::default(),
            kadindexer: KadindexerConfig::default(),
            portfolio_addresses: vec![DEFAULT_PORTFOLIO_ADDRESS.to_string()],
            coins_file: None,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Comma-separated list, blanks dropped
pub fn parse_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

impl DataConfig {
    pub fn from_env() -> Self {
        let retry = RetryPolicy::from_env("REQUEST_THROTTLE_MS", 1000);
        let defaults = Self::default();

        let mobula = var("MOBULA_API_KEY").map(|key| MobulaConfig {
            base_url: var("MOBULA_BASE_URL").unwrap_or_else(|| MobulaConfig::DEFAULT_BASE_URL.into()),
            api_key: key,
            retry,
        });

        let portfolio_addresses = var("PORTFOLIO_ADDRESSES")
            .map(|raw| parse_addresses(&raw))
            .filter(|a| !a.is_empty())
            .unwrap_or(defaults.portfolio_addresses);

        Self {
            mobula,
            lunarcrush: LunarCrushConfig {
                base_url: var("LUNARCRUSH_BASE_URL").unwrap_or(defaults.lunarcrush.base_url),
                api_key: var("LUNARCRUSH_API_KEY"),
                retry,
            },
            cryptopanic: CryptoPanicConfig {
                base_url: var("CRYPTOPANIC_BASE_URL").unwrap_or(defaults.cryptopanic.base_url),
                api_key: var("CRYPTOPANIC_API_KEY"),
                retry,
            },
            kadindexer: KadindexerConfig {
                endpoint: var("KADENA_GRAPHQL_ENDPOINT").unwrap_or(defaults.kadindexer.endpoint),
                api_key: var("KADENA_GRAPHQL_KEY"),
                retry,
            },
            portfolio_addresses,
            coins_file: var("COINS_FILE").map(PathBuf::from),
        }
    }
}

/// Every outbound source a capability may use
#[derive(Clone)]
pub struct DataSources {
    pub market: Arc<dyn MarketDataSource>,
    pub social: Arc<dyn SocialDataSource>,
    pub news: Arc<dyn NewsSource>,
    pub chain: Arc<dyn ChainIndexer>,
    pub tokens: Arc<TokenTable>,
    pub portfolio_addresses: Arc<[String]>,
}

impl DataSources {
    pub fn from_config(config: &DataConfig) -> Result<Self> {
        let market: Arc<dyn MarketDataSource> = match &config.mobula {
            Some(mobula) => Arc::new(MobulaSource::new(mobula)?),
            None => {
                tracing::warn!("MOBULA_API_KEY not set; using mock market data");
                Arc::new(MockMarketSource::new())
            }
        };

        let tokens = match &config.coins_file {
            Some(path) => TokenTable::load(path)?,
            None => TokenTable::builtin(),
        };

        tracing::info!(
            market = market.name(),
            tokens = tokens.len(),
            wallets = config.portfolio_addresses.len(),
            "Data sources ready"
        );

        Ok(Self {
            market,
            social: Arc::new(LunarCrushSource::new(&config.lunarcrush)?),
            news: Arc::new(CryptoPanicSource::new(&config.cryptopanic)?),
            chain: Arc::new(KadindexerClient::new(&config.kadindexer)?),
            tokens: Arc::new(tokens),
            portfolio_addresses: config.portfolio_addresses.clone().into(),
        })
    }
}
