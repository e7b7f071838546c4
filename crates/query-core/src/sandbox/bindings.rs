//! Read-only constants visible to call plans

use std::collections::BTreeMap;

use serde_json::{json, Value};

const DAY_MS: u64 = 86_400_000;

/// Named look-back windows, in milliseconds
pub const PERIODS: [(&str, u64); 4] = [
    ("1d", DAY_MS),
    ("7d", 7 * DAY_MS),
    ("30d", 30 * DAY_MS),
    ("1y", 365 * DAY_MS),
];

pub const PERIODS_BINDING: &str = "periods";
pub const PORTFOLIO_BINDING: &str = "portfolioAddresses";

/// Milliseconds for a period tag such as `7d`
pub fn period_millis(tag: &str) -> Option<u64> {
    let tag = tag.trim();
    PERIODS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, ms)| *ms)
}

/// Constants a program may read through `{"$const": name}`.
///
/// Values are cloned into each result; a program can never alter them.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    constants: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// `periods` plus the configured portfolio wallets
    pub fn standard(portfolio_addresses: &[String]) -> Self {
        let periods: serde_json::Map<String, Value> = PERIODS
            .iter()
            .map(|(name, ms)| ((*name).to_string(), json!(ms)))
            .collect();

        Self::new()
            .with(PERIODS_BINDING, Value::Object(periods))
            .with(PORTFOLIO_BINDING, json!(portfolio_addresses))
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constants.keys().map(String::as_str).collect()
    }

    /// Portfolio wallets, for prompt assembly
    pub fn portfolio_addresses(&self) -> Vec<String> {
        self.get(PORTFOLIO_BINDING)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
