//! Social metrics and news capabilities
//!
//! LunarCrush failures are logged and reported to the program as a "no data"
//! sentence so a plan mixing market and social calls still returns something.
//! `listByCategory` is the exception: an empty list is an error.

use async_trait::async_trait;
use chrono::DateTime;
use query_core::{ArgReader, Capability, CapabilitySchema, ParameterSchema, QueryError, Result};
use serde_json::{json, Value};

use super::{or_null, token_param};
use crate::config::DataSources;

fn field(item: &Value, key: &str) -> Value {
    or_null(item.get(key).cloned())
}

fn social_summary(data: &Value) -> Value {
    json!({
        "topic": field(data, "topic"),
        "title": field(data, "title"),
        "topicRank": field(data, "topic_rank"),
        "relatedTopics": field(data, "related_topics"),
        "postCounts": field(data, "types_count"),
        "interactions": {
            "total24h": field(data, "interactions_24h"),
            "byType": field(data, "types_interactions"),
        },
        "sentiment": {
            "byType": field(data, "types_sentiment"),
            "details": field(data, "types_sentiment_detail"),
        },
        "contributors": field(data, "num_contributors"),
        "totalPosts": field(data, "num_posts"),
        "categories": field(data, "categories"),
        "trend": field(data, "trend"),
    })
}

fn coin_summary(coin: &Value) -> Value {
    let categories: Vec<&str> = coin
        .get("categories")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(|c| c.split(',').collect())
        .unwrap_or_default();

    json!({
        "id": field(coin, "id"),
        "symbol": field(coin, "symbol"),
        "name": field(coin, "name"),
        "price": {"usd": field(coin, "price"), "btc": field(coin, "price_btc")},
        "volume24h": field(coin, "volume_24h"),
        "volatility": field(coin, "volatility"),
        "supply": {
            "circulating": field(coin, "circulating_supply"),
            "max": field(coin, "max_supply"),
        },
        "priceChange": {
            "1h": field(coin, "percent_change_1h"),
            "24h": field(coin, "percent_change_24h"),
            "7d": field(coin, "percent_change_7d"),
            "30d": field(coin, "percent_change_30d"),
        },
        "marketCap": {
            "value": field(coin, "market_cap"),
            "rank": field(coin, "market_cap_rank"),
            "dominance": field(coin, "market_dominance"),
            "previousDominance": field(coin, "market_dominance_prev"),
        },
        "social": {
            "interactions24h": field(coin, "interactions_24h"),
            "volume24h": field(coin, "social_volume_24h"),
            "dominance": field(coin, "social_dominance"),
            "sentiment": field(coin, "sentiment"),
        },
        "scores": {
            "galaxy": {
                "current": field(coin, "galaxy_score"),
                "previous": field(coin, "galaxy_score_previous"),
            },
            "altRank": {
                "current": field(coin, "alt_rank"),
                "previous": field(coin, "alt_rank_previous"),
            },
        },
        "categories": categories,
        "blockchains": field(coin, "blockchains"),
        "topic": field(coin, "topic"),
        "logo": field(coin, "logo"),
        "lastUpdated": {
            "price": field(coin, "last_updated_price"),
            "source": field(coin, "last_updated_price_by"),
        },
    })
}

fn news_item(item: &Value) -> Value {
    let created = item
        .get("post_created")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));

    json!({
        "id": field(item, "id"),
        "type": field(item, "post_type"),
        "title": field(item, "post_title"),
        "url": field(item, "post_link"),
        "image": field(item, "post_image"),
        "created": created,
        "sentiment": field(item, "post_sentiment"),
        "creator": {
            "id": field(item, "creator_id"),
            "name": field(item, "creator_name"),
            "displayName": field(item, "creator_display_name"),
            "followers": field(item, "creator_followers"),
            "avatar": field(item, "creator_avatar"),
        },
        "interactions": {
            "last24h": field(item, "interactions_24h"),
            "total": field(item, "interactions_total"),
        },
    })
}

fn items(data: &Value) -> &[Value] {
    data.as_array().map_or(&[], Vec::as_slice)
}

pub struct SocialData {
    sources: DataSources,
}

impl SocialData {
    pub const NAME: &'static str = "socialData";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for SocialData {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns social metrics: topicRank, relatedTopics, postCounts, interactions, sentiment, contributors, totalPosts, trend".into(),
            parameters: vec![token_param()],
            category: Some("Social & News".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let token = ArgReader::new(Self::NAME, args).string(0)?;
        let topic = self.sources.tokens.normalize(&token);

        match self.sources.social.topic(&topic).await {
            Ok(Some(data)) => Ok(social_summary(&data)),
            Ok(None) => Ok(Value::from("No social data available")),
            Err(e) => {
                tracing::warn!(capability = Self::NAME, topic = %topic, error = %e, "Social data unavailable");
                Ok(Value::from("No social data available"))
            }
        }
    }
}

pub struct ListByCategory {
    sources: DataSources,
}

impl ListByCategory {
    pub const NAME: &'static str = "listByCategory";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for ListByCategory {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns ranked coins with price, market cap, social and score metrics".into(),
            parameters: vec![
                ParameterSchema::optional(
                    "sort",
                    "string",
                    "Field to sort by, e.g. social_dominance, market_cap, galaxy_score",
                    Some(json!("social_dominance")),
                ),
                ParameterSchema::optional(
                    "filter",
                    "string",
                    "Category filter, e.g. meme or defi; empty for all",
                    Some(json!("")),
                ),
                ParameterSchema::optional("limit", "number", "Number of coins", Some(json!(20))),
            ],
            category: Some("Social & News".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let reader = ArgReader::new(Self::NAME, args);
        let sort = reader.opt_string(0)?.unwrap_or_else(|| "social_dominance".into());
        let filter = reader.opt_string(1)?.unwrap_or_default();
        let limit = reader.u64_or(2, 20)?;

        let data = match self.sources.social.coin_list(&sort, &filter, limit).await {
            Ok(Some(data)) => Some(data),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(capability = Self::NAME, error = %e, "Coin list unavailable");
                None
            }
        }
        .ok_or_else(|| QueryError::ExternalApi("No data received from LunarCrush API".into()))?;

        Ok(items(&data).iter().map(coin_summary).collect())
    }
}

pub struct TopicNews {
    sources: DataSources,
}

impl TopicNews {
    pub const NAME: &'static str = "topicNews";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for TopicNews {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns latest articles [{title, url, created, sentiment, creator, interactions}]".into(),
            parameters: vec![ParameterSchema::required("topic", "string", "Topic, usually a lowercase token name")],
            category: Some("Social & News".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let topic = ArgReader::new(Self::NAME, args).string(0)?;

        match self.sources.social.topic_news(&topic).await {
            Ok(Some(data)) => Ok(items(&data).iter().map(news_item).collect()),
            Ok(None) => Ok(Value::from("No news data available")),
            Err(e) => {
                tracing::warn!(capability = Self::NAME, topic = %topic, error = %e, "Topic news unavailable");
                Ok(Value::from("No news data available"))
            }
        }
    }
}

/// Headlines from the news aggregator
pub struct CryptoNews {
    sources: DataSources,
}

impl CryptoNews {
    pub const NAME: &'static str = "cryptoNews";

    pub const fn new(sources: DataSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Capability for CryptoNews {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: Self::NAME.into(),
            description: "returns recent news posts mentioning the token".into(),
            parameters: vec![ParameterSchema::required("token", "string", "Token symbol, e.g. \"BTC\"")],
            category: Some("Social & News".into()),
        }
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let token = ArgReader::new(Self::NAME, args).string(0)?;
        let posts = self.sources.news.posts(&token.trim().to_uppercase()).await?;
        Ok(posts.unwrap_or_else(|| Value::from("No news data available")))
    }
}
