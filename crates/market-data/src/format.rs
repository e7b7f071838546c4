//! Display formatting and lenient decoding of market numbers

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const NOT_AVAILABLE: &str = "N/A";

/// `$1234.50`, or `N/A` when missing
pub fn usd(value: Option<Decimal>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("${:.2}", v.round_dp(2)))
}

/// `-1.25%`, or `N/A` when missing
pub fn percent(value: Option<Decimal>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.2}%", v.round_dp(2)))
}

/// Convert a JSON number (or numeric string) into a `Decimal`.
/// Values outside `Decimal`'s range come back as `None`.
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    // serde_json renders floats in shortest round-trip form, so going through
    // the text keeps `0.1` as exactly 0.1
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

/// `deserialize_with` helper: any unusable value decodes as `None` instead of
/// failing the whole record
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(to_decimal))
}

/// Decimal back into a JSON number for structured capability results
pub fn decimal_value(value: Decimal) -> Value {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Ok(i) = i64::try_from(normalized) {
            return Value::from(i);
        }
    }
    serde_json::from_str::<serde_json::Number>(&normalized.to_string())
        .map_or_else(|_| Value::String(normalized.to_string()), Value::Number)
}
