//! Chain Indexer
//!
//! Kadena on-chain data through the Kadindexer GraphQL API.

mod kadindexer;
pub mod queries;

pub use kadindexer::{KadindexerClient, KadindexerConfig};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// GraphQL indexer. Returns the response's `data` member; a response with
/// `errors` fails with the first error's message.
#[async_trait]
pub trait ChainIndexer: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, document: &str, variables: Value) -> Result<Value>;
}
