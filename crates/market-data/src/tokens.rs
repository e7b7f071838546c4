//! Token name normalization
//!
//! Data APIs key assets by lowercase name (`bitcoin`), while users type
//! symbols (`BTC`) or names in any case. [`TokenTable::normalize`] maps either
//! form onto the lowercase name, falling back to the lowercased input.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// One entry of the coins file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub name: String,
    pub symbol: String,
}

const MAJORS: &[(&str, &str)] = &[
    ("Bitcoin", "BTC"),
    ("Ethereum", "ETH"),
    ("Solana", "SOL"),
    ("Cardano", "ADA"),
    ("Polkadot", "DOT"),
    ("Chainlink", "LINK"),
    ("Avalanche", "AVAX"),
    ("Polygon", "MATIC"),
    ("Cosmos", "ATOM"),
    ("Ripple", "XRP"),
    ("Dogecoin", "DOGE"),
    ("Shiba Inu", "SHIB"),
    ("Uniswap", "UNI"),
    ("Litecoin", "LTC"),
    ("Bitcoin Cash", "BCH"),
    ("Kadena", "KDA"),
];

#[derive(Clone, Debug)]
pub struct TokenTable {
    /// lowercase name or symbol -> lowercase name
    lookup: HashMap<String, String>,
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TokenTable {
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut lookup = HashMap::new();
        for coin in coins {
            let name = coin.name.to_lowercase();
            // First entry wins, like a linear scan over the file would
            lookup.entry(coin.symbol.to_lowercase()).or_insert_with(|| name.clone());
            lookup.entry(name.clone()).or_insert(name);
        }
        Self { lookup }
    }

    /// Table of major assets only
    pub fn builtin() -> Self {
        Self::new(Self::builtin_coins())
    }

    /// Load a JSON array of `{name, symbol}` entries. The built-in majors are
    /// appended after the file's entries.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("cannot read coins file {}: {e}", path.display())))?;
        let mut coins: Vec<Coin> = serde_json::from_str(&raw)?;

        tracing::info!(path = %path.display(), coins = coins.len(), "Loaded token table");

        coins.extend(Self::builtin_coins());
        Ok(Self::new(coins))
    }

    fn builtin_coins() -> impl Iterator<Item = Coin> {
        MAJORS.iter().map(|(name, symbol)| Coin {
            name: (*name).to_string(),
            symbol: (*symbol).to_string(),
        })
    }

    /// Lowercase name for a name or symbol; unknown input comes back lowercased
    pub fn normalize(&self, input: &str) -> String {
        let key = input.trim().to_lowercase();
        self.lookup.get(&key).cloned().unwrap_or(key)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}
