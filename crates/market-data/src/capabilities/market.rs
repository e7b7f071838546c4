//! Per-field market and metadata capabilities

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use query_core::{ArgReader, Capability, CapabilitySchema, Result};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::token_param;
use crate::config::DataSources;
use crate::format::{decimal_value, percent, usd, NOT_AVAILABLE};
use crate::market::{CexListing, DistributionShare, Investor, MarketData, TokenMetadata, UnlockEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Render {
    Usd,
    Percent,
    Number,
}

/// One field of the market snapshot, exposed as its own capability
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketField {
    Price,
    Volume,
    MarketCap,
    MarketCapDiluted,
    Liquidity,
    LiquidityChange24h,
    OffChainVolume,
    Volume7d,
    VolumeChange24h,
    PriceChange1h,
    PriceChange24h,
    PriceChange7d,
    PriceChange1m,
    PriceChange30d,
    PriceChange1y,
    Ath,
    Atl,
    Rank,
    TotalSupply,
    CirculatingSupply,
    IsListed,
}

impl MarketField {
    pub const ALL: [Self; 21] = [
        Self::Price,
        Self::Volume,
        Self::MarketCap,
        Self::MarketCapDiluted,
        Self::Liquidity,
        Self::LiquidityChange24h,
        Self::OffChainVolume,
        Self::Volume7d,
        Self::VolumeChange24h,
        Self::PriceChange1h,
        Self::PriceChange24h,
        Self::PriceChange7d,
        Self::PriceChange1m,
        Self::PriceChange30d,
        Self::PriceChange1y,
        Self::Ath,
        Self::Atl,
        Self::Rank,
        Self::TotalSupply,
        Self::CirculatingSupply,
        Self::IsListed,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::MarketCap => "marketCap",
            Self::MarketCapDiluted => "marketCapDiluted",
            Self::Liquidity => "liquidity",
            Self::LiquidityChange24h => "liquidityChange24h",
            Self::OffChainVolume => "offChainVolume",
            Self::Volume7d => "volume7d",
            Self::VolumeChange24h => "volumeChange24h",
            Self::PriceChange1h => "priceChange1h",
            Self::PriceChange24h => "priceChange24h",
            Self::PriceChange7d => "priceChange7d",
            Self::PriceChange1m => "priceChange1m",
            Self::PriceChange30d => "priceChange30d",
            Self::PriceChange1y => "priceChange1y",
            Self::Ath => "ath",
            Self::Atl => "atl",
            Self::Rank => "rank",
            Self::TotalSupply => "totalSupply",
            Self::CirculatingSupply => "circulatingSupply",
            Self::IsListed => "isListed",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Price => "current price in USD",
            Self::Volume => "24h trading volume in USD",
            Self::MarketCap => "market capitalization in USD",
            Self::MarketCapDiluted => "fully diluted market cap in USD",
            Self::Liquidity => "current liquidity in USD",
            Self::LiquidityChange24h => "24h liquidity change %",
            Self::OffChainVolume => "off-chain volume in USD",
            Self::Volume7d => "7d trading volume in USD",
            Self::VolumeChange24h => "24h volume change %",
            Self::PriceChange1h => "1h price change %",
            Self::PriceChange24h => "24h price change %",
            Self::PriceChange7d => "7d price change %",
            Self::PriceChange1m | Self::PriceChange30d => "30d price change %",
            Self::PriceChange1y => "1y price change %",
            Self::Ath => "all-time high price in USD",
            Self::Atl => "all-time low price in USD",
            Self::Rank => "market cap rank (number)",
            Self::TotalSupply => "total supply (number)",
            Self::CirculatingSupply => "circulating supply (number)",
            Self::IsListed => "\"Listed\" or \"Not Listed\"",
        }
    }

    const fn category(self) -> &'static str {
        match self {
            Self::Price | Self::Volume | Self::MarketCap | Self::MarketCapDiluted | Self::IsListed => "Market Data",
            Self::Liquidity | Self::LiquidityChange24h | Self::OffChainVolume | Self::Volume7d => "Token Metrics",
            Self::VolumeChange24h
            | Self::PriceChange1h
            | Self::PriceChange24h
            | Self::PriceChange7d
            | Self::PriceChange1m
            | Self::PriceChange30d
            | Self::PriceChange1y => "Price Changes",
            Self::Ath | Self::Atl | Self::Rank | Self::TotalSupply | Self::CirculatingSupply => "Token Stats",
        }
    }

    fn value(self, data: &MarketData) -> (Option<Decimal>, Render) {
        match self {
            Self::Price => (data.price, Render::Usd),
            Self::Volume => (data.volume, Render::Usd),
            Self::MarketCap => (data.market_cap, Render::Usd),
            Self::MarketCapDiluted => (data.market_cap_diluted, Render::Usd),
            Self::Liquidity => (data.liquidity, Render::Usd),
            Self::OffChainVolume => (data.off_chain_volume, Render::Usd),
            Self::Volume7d => (data.volume_7d, Render::Usd),
            Self::Ath => (data.ath, Render::Usd),
            Self::Atl => (data.atl, Render::Usd),
            Self::LiquidityChange24h => (data.liquidity_change_24h, Render::Percent),
            Self::VolumeChange24h => (data.volume_change_24h, Render::Percent),
            Self::PriceChange1h => (data.price_change_1h, Render::Percent),
            Self::PriceChange24h => (data.price_change_24h, Render::Percent),
            Self::PriceChange7d => (data.price_change_7d, Render::Percent),
            Self::PriceChange1m | Self::PriceChange30d => (data.price_change_1m, Render::Percent),
            Self::PriceChange1y => (data.price_change_1y, Render::Percent),
            Self::Rank => (data.rank.map(Decimal::from), Render::Number),
            Self::TotalSupply => (data.total_supply, Render::Number),
            Self::CirculatingSupply => (data.circulating_supply, Render::Number),
            Self::IsListed => (None, Render::Number),
        }
    }

    /// Render the field for a snapshot (`None` when the asset is unknown)
    pub fn render(self, data: Option<&MarketData>) -> Value {
        if self == Self::IsListed {
            return Value::from(if data.is_some() { "Listed" } else { "Not Listed" });
        }

        let Some(data) = data else {
            return Value::from(NOT_AVAILABLE);
        };

        match self.value(data) {
            (value, Render::Usd) => Value::from(usd(value)),
            (value, Render::Percent) => Value::from(percent(value)),
            (Some(value), Render::Number) => decimal_value(value),
            (None, Render::Number) => Value::from(NOT_AVAILABLE),
        }
    }
}

pub struct MarketFieldCapability {
    field: MarketField,
    sources: DataSources,
}

impl MarketFieldCapability {
    pub const fn new(field: MarketField, sources: DataSources) -> Self {
        Self { field, sources }
    }
}

#[async_trait]
impl Capability for MarketFieldCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: self.field.name().into(),
            description: format!("returns {}", self.field.description()),
            parameters: vec![token_param()],
            category: Some(self.field.category().into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let token = ArgReader::new(self.field.name(), args).string(0)?;
        let asset = self.sources.tokens.normalize(&token);
        let data = self.sources.market.market_data(&asset).await?;
        Ok(self.field.render(data.as_ref()))
    }
}

/// One field of the project metadata, exposed as its own capability
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataField {
    Website,
    Twitter,
    Telegram,
    Discord,
    Description,
    Cexs,
    Investors,
    Distribution,
    ReleaseSchedule,
}

impl MetadataField {
    pub const ALL: [Self; 9] = [
        Self::Website,
        Self::Twitter,
        Self::Telegram,
        Self::Discord,
        Self::Description,
        Self::Cexs,
        Self::Investors,
        Self::Distribution,
        Self::ReleaseSchedule,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Twitter => "twitter",
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Description => "description",
            Self::Cexs => "cexs",
            Self::Investors => "investors",
            Self::Distribution => "distribution",
            Self::ReleaseSchedule => "releaseSchedule",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Website => "returns official website URL",
            Self::Twitter => "returns Twitter handle",
            Self::Telegram => "returns Telegram group link",
            Self::Discord => "returns Discord server link",
            Self::Description => "returns project description",
            Self::Cexs => "returns {totalListings, exchanges: [{name, logo}]}",
            Self::Investors => {
                "returns {totalInvestors, leadInvestors, vcInvestors, angelInvestors, allInvestors}"
            }
            Self::Distribution => "returns [{category, percentage}]",
            Self::ReleaseSchedule => {
                "returns {totalTokensInSchedule, totalUnlockEvents, upcomingUnlocks, fullSchedule}"
            }
        }
    }

    const fn category(self) -> &'static str {
        match self {
            Self::Website | Self::Twitter | Self::Telegram | Self::Discord | Self::Description => {
                "Token Information"
            }
            Self::Cexs | Self::Investors | Self::Distribution | Self::ReleaseSchedule => "Token Analysis",
        }
    }

    /// Render the field; structured fields fall back to a sentence when absent
    pub fn render(self, metadata: Option<&TokenMetadata>, now: DateTime<Utc>) -> Value {
        let text = |value: Option<&String>| {
            Value::from(value.filter(|v| !v.is_empty()).map_or(NOT_AVAILABLE, String::as_str))
        };

        match self {
            Self::Website => text(metadata.and_then(|m| m.website.as_ref())),
            Self::Twitter => text(metadata.and_then(|m| m.twitter.as_ref())),
            Self::Telegram => text(metadata.and_then(|m| m.telegram.as_ref())),
            Self::Discord => text(metadata.and_then(|m| m.discord.as_ref())),
            Self::Description => text(metadata.and_then(|m| m.description.as_ref())),
            Self::Cexs => metadata
                .and_then(|m| m.cexs.as_deref())
                .map_or_else(|| Value::from("No CEX listing information available"), cex_summary),
            Self::Investors => metadata
                .and_then(|m| m.investors.as_deref())
                .map_or_else(|| Value::from("No investor information available"), investor_summary),
            Self::Distribution => metadata
                .and_then(|m| m.distribution.as_deref())
                .map_or_else(|| Value::from("No distribution information available"), distribution),
            Self::ReleaseSchedule => metadata
                .and_then(|m| m.release_schedule.as_deref())
                .map_or_else(
                    || Value::from("No release schedule information available"),
                    |events| release_schedule(events, now),
                ),
        }
    }
}

fn cex_summary(cexs: &[CexListing]) -> Value {
    let exchanges: Vec<Value> = cexs
        .iter()
        .filter_map(|cex| {
            let id = cex.id.as_ref()?;
            Some(json!({
                "name": cex.name.as_ref().unwrap_or(id),
                "logo": cex.logo,
            }))
        })
        .collect();

    json!({
        "totalListings": exchanges.len(),
        "exchanges": exchanges,
    })
}

fn investor_summary(investors: &[Investor]) -> Value {
    let count_type = |kind: &str| investors.iter().filter(|i| i.kind.as_deref() == Some(kind)).count();

    let lead: Vec<&str> = investors
        .iter()
        .filter(|i| i.lead == Some(true))
        .filter_map(|i| i.name.as_deref())
        .collect();

    let all: Vec<Value> = investors
        .iter()
        .map(|i| {
            json!({
                "name": i.name,
                "type": i.kind,
                "isLead": i.lead.unwrap_or(false),
                "country": i.country_name.as_deref().unwrap_or("Unknown"),
                "image": i.image,
            })
        })
        .collect();

    json!({
        "totalInvestors": investors.len(),
        "leadInvestors": lead,
        "vcInvestors": count_type("Ventures Capital"),
        "angelInvestors": count_type("Angel Investor"),
        "allInvestors": all,
    })
}

fn distribution(shares: &[DistributionShare]) -> Value {
    shares
        .iter()
        .map(|share| json!({"category": share.name, "percentage": share.percentage}))
        .collect()
}

/// Epoch milliseconds, numeric string or RFC 3339 text
fn unlock_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))),
        _ => None,
    }
}

fn release_schedule(events: &[UnlockEvent], now: DateTime<Utc>) -> Value {
    let mut schedule: Vec<(Option<DateTime<Utc>>, &UnlockEvent)> =
        events.iter().map(|e| (unlock_date(&e.unlock_date), e)).collect();

    let entry = |date: Option<DateTime<Utc>>, event: &UnlockEvent| {
        json!({
            "date": date.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            "tokensToUnlock": event.tokens_to_unlock.map(decimal_value),
            "allocation": event.allocation_details,
        })
    };

    let total: Decimal = events.iter().filter_map(|e| e.tokens_to_unlock).sum();
    let full: Vec<Value> = schedule.iter().map(|(date, event)| entry(*date, event)).collect();

    schedule.retain(|(date, _)| date.is_some_and(|d| d > now));
    schedule.sort_by_key(|(date, _)| *date);
    let upcoming: Vec<Value> = schedule
        .iter()
        .take(5)
        .map(|(date, event)| entry(*date, event))
        .collect();

    json!({
        "totalTokensInSchedule": decimal_value(total),
        "totalUnlockEvents": events.len(),
        "upcomingUnlocks": upcoming,
        "fullSchedule": full,
    })
}

pub struct MetadataFieldCapability {
    field: MetadataField,
    sources: DataSources,
}

impl MetadataFieldCapability {
    pub const fn new(field: MetadataField, sources: DataSources) -> Self {
        Self { field, sources }
    }
}

#[async_trait]
impl Capability for MetadataFieldCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: self.field.name().into(),
            description: self.field.description().into(),
            parameters: vec![token_param()],
            category: Some(self.field.category().into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let token = ArgReader::new(self.field.name(), args).string(0)?;
        let asset = self.sources.tokens.normalize(&token);
        let metadata = self.sources.market.metadata(&asset).await?;
        Ok(self.field.render(metadata.as_ref(), Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::offline_sources;
    use rust_decimal_macros::dec;

    #[test]
    fn test_field_names_are_unique() {
        let mut names: Vec<&str> = MarketField::ALL.iter().map(|f| f.name()).collect();
        names.extend(MetadataField::ALL.iter().map(|f| f.name()));
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_market_rendering() {
        let data = MarketData {
            price: Some(dec!(97500)),
            price_change_1m: Some(dec!(-3.456)),
            rank: Some(1),
            total_supply: Some(dec!(21000000)),
            ..MarketData::default()
        };

        assert_eq!(MarketField::Price.render(Some(&data)), json!("$97500.00"));
        assert_eq!(MarketField::PriceChange30d.render(Some(&data)), json!("-3.46%"));
        assert_eq!(MarketField::PriceChange1m.render(Some(&data)), json!("-3.46%"));
        assert_eq!(MarketField::Rank.render(Some(&data)), json!(1));
        assert_eq!(MarketField::TotalSupply.render(Some(&data)), json!(21_000_000));
        assert_eq!(MarketField::Liquidity.render(Some(&data)), json!("N/A"));
        assert_eq!(MarketField::VolumeChange24h.render(Some(&data)), json!("N/A"));
        assert_eq!(MarketField::CirculatingSupply.render(Some(&data)), json!("N/A"));
        assert_eq!(MarketField::IsListed.render(Some(&data)), json!("Listed"));

        assert_eq!(MarketField::Price.render(None), json!("N/A"));
        assert_eq!(MarketField::IsListed.render(None), json!("Not Listed"));
    }

    #[tokio::test]
    async fn test_price_capability_normalizes_symbol() {
        let capability = MarketFieldCapability::new(MarketField::Price, offline_sources());
        assert_eq!(capability.invoke(&[json!("BTC")]).await.unwrap(), json!("$97500.00"));
        assert_eq!(capability.invoke(&[json!("unknowncoin")]).await.unwrap(), json!("N/A"));
        assert!(capability.invoke(&[]).await.is_err());
    }

    #[test]
    fn test_metadata_fallbacks() {
        let now = Utc::now();
        assert_eq!(MetadataField::Website.render(None, now), json!("N/A"));
        assert_eq!(
            MetadataField::Cexs.render(Some(&TokenMetadata::default()), now),
            json!("No CEX listing information available")
        );
        assert_eq!(
            MetadataField::ReleaseSchedule.render(None, now),
            json!("No release schedule information available")
        );
    }

    #[test]
    fn test_cex_and_investor_summaries() {
        let metadata: TokenMetadata = serde_json::from_value(json!({
            "cexs": [
                {"id": "binance", "name": "Binance", "logo": "b.png"},
                {"id": "okx"},
                {"name": "no id, dropped"}
            ],
            "investors": [
                {"name": "Fund A", "type": "Ventures Capital", "lead": true},
                {"name": "Fund B", "type": "Ventures Capital"},
                {"name": "Alice", "type": "Angel Investor", "country_name": "France"}
            ]
        }))
        .unwrap();
        let now = Utc::now();

        let cexs = MetadataField::Cexs.render(Some(&metadata), now);
        assert_eq!(cexs["totalListings"], 2);
        assert_eq!(cexs["exchanges"][1], json!({"name": "okx", "logo": null}));

        let investors = MetadataField::Investors.render(Some(&metadata), now);
        assert_eq!(investors["totalInvestors"], 3);
        assert_eq!(investors["leadInvestors"], json!(["Fund A"]));
        assert_eq!(investors["vcInvestors"], 2);
        assert_eq!(investors["angelInvestors"], 1);
        assert_eq!(investors["allInvestors"][1]["country"], "Unknown");
        assert_eq!(investors["allInvestors"][2]["country"], "France");
    }

    #[test]
    fn test_release_schedule_upcoming() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let day = 86_400_000_i64;
        let base = now.timestamp_millis();

        let mut events = vec![json!({"unlock_date": base - day, "tokens_to_unlock": 100, "allocation_details": {"team": 100}})];
        for i in (1..=6).rev() {
            events.push(json!({"unlock_date": base + i * day, "tokens_to_unlock": 10.5}));
        }
        let metadata: TokenMetadata = serde_json::from_value(json!({"release_schedule": events})).unwrap();

        let schedule = MetadataField::ReleaseSchedule.render(Some(&metadata), now);
        assert_eq!(schedule["totalUnlockEvents"], 7);
        assert_eq!(schedule["totalTokensInSchedule"], json!(163));
        assert_eq!(schedule["fullSchedule"][0]["date"], "2024-12-31T00:00:00.000Z");
        assert_eq!(schedule["fullSchedule"][0]["allocation"], json!({"team": 100}));

        let upcoming = schedule["upcomingUnlocks"].as_array().unwrap();
        assert_eq!(upcoming.len(), 5);
        assert_eq!(upcoming[0]["date"], "2025-01-02T00:00:00.000Z");
        assert_eq!(upcoming[4]["date"], "2025-01-06T00:00:00.000Z");
    }
}
