//! Capability catalog
//!
//! Wraps the data sources as named capabilities for the call-plan sandbox.
//! Every capability takes positional arguments; token arguments accept a
//! name or a symbol in any case.

mod chain;
mod history;
mod market;
mod social;

pub use chain::{ChainOperation, ChainQuery, PagedChainQuery, PagedOperation};
pub use history::{HistoricPortfolio, PriceHistory, WalletPortfolio};
pub use market::{MarketField, MarketFieldCapability, MetadataField, MetadataFieldCapability};
pub use social::{CryptoNews, ListByCategory, SocialData, TopicNews};

use query_core::sandbox::period_millis;
use query_core::{ArgReader, CapabilityRegistry, ParameterSchema, QueryError, Result};
use serde_json::Value;

use crate::config::DataSources;

pub(crate) fn token_param() -> ParameterSchema {
    ParameterSchema::required("token", "string", "Token name or symbol, e.g. \"bitcoin\" or \"BTC\"")
}

pub(crate) fn period_param() -> ParameterSchema {
    ParameterSchema::required("period", "string", "Look-back window: \"1d\", \"7d\", \"30d\" or \"1y\"")
}

/// Read a look-back window: a period tag (`7d`) or a millisecond count
pub(crate) fn period_arg(args: &ArgReader<'_>, capability: &str, idx: usize) -> Result<u64> {
    let raw = args.string(idx)?;
    period_millis(&raw)
        .or_else(|| raw.parse::<u64>().ok().filter(|ms| *ms > 0))
        .ok_or_else(|| QueryError::InvalidArguments {
            capability: capability.to_string(),
            message: format!("unknown period '{raw}', expected 1d, 7d, 30d or 1y"),
        })
}

/// Register every market, history, social and chain capability
pub fn register_all(registry: &mut CapabilityRegistry, sources: &DataSources) {
    for field in MarketField::ALL {
        registry.register(MarketFieldCapability::new(field, sources.clone()));
    }
    for field in MetadataField::ALL {
        registry.register(MetadataFieldCapability::new(field, sources.clone()));
    }

    registry.register(PriceHistory::new(sources.clone()));
    registry.register(WalletPortfolio::new(sources.clone()));
    registry.register(HistoricPortfolio::new(sources.clone()));

    registry.register(SocialData::new(sources.clone()));
    registry.register(ListByCategory::new(sources.clone()));
    registry.register(TopicNews::new(sources.clone()));
    registry.register(CryptoNews::new(sources.clone()));

    for operation in ChainOperation::ALL {
        registry.register(ChainQuery::new(operation, sources.chain.clone()));
    }
    for operation in PagedOperation::ALL {
        registry.register(PagedChainQuery::new(operation, sources.chain.clone()));
    }

    tracing::info!(capabilities = registry.len(), "Capability catalog registered");
}

/// JSON `null` for a missing upstream value
pub(crate) fn or_null(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}
