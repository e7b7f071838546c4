//! # market-data
//!
//! Crypto market, social and on-chain data sources, exposed to generated
//! call plans as capabilities.
//!
//! ## Sources
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  capability              source              transport           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  price, marketCap, ...   Mobula (or mock)    GET  /market/data   │
//! │  website, investors ...  Mobula (or mock)    GET  /metadata      │
//! │  priceHistory            Mobula (or mock)    GET  /market/history│
//! │  walletPortfolio         Mobula (or mock)    GET  /wallet/...    │
//! │  socialData, topicNews   LunarCrush          GET  /topic/...     │
//! │  listByCategory          LunarCrush          GET  /coins/list/v2 │
//! │  cryptoNews              CryptoPanic         GET  /posts/        │
//! │  getBlock, getAll*, ...  Kadindexer          POST GraphQL        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every client goes through [`RateLimitedClient`]: a per-client minimum
//! interval between requests, and exponential backoff on HTTP 429.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_data::{register_all, DataConfig, DataSources};
//!
//! let sources = DataSources::from_config(&DataConfig::from_env())?;
//! let mut registry = CapabilityRegistry::new();
//! register_all(&mut registry, &sources);
//! ```

pub mod capabilities;
pub mod chain;
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod market;
pub mod social;
pub mod tokens;

pub use capabilities::register_all;
pub use config::{DataConfig, DataSources};
pub use error::{DataError, Result};
pub use http::RateLimitedClient;
pub use market::{MarketData, MarketDataSource, MockMarketSource, TokenMetadata};
pub use tokens::TokenTable;
