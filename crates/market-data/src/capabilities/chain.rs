//! Kadena chain capabilities
//!
//! Single-page queries return the indexer's `data` member unchanged; the
//! `getAll*` variants walk `pageInfo.endCursor` and return the flattened nodes.

use std::sync::Arc;

use async_trait::async_trait;
use query_core::{paginate, ArgReader, Capability, CapabilitySchema, ParameterSchema, QueryError, Result};
use serde_json::{json, Map, Value};

use crate::chain::{queries, ChainIndexer};

const CATEGORY: &str = "Kadena Blockchain";

const TRANSACTION_FILTERS: &[&str] = &[
    "accountName",
    "blockHash",
    "chainId",
    "requestKey",
    "first",
    "after",
    "maxHeight",
    "minHeight",
    "minimumDepth",
];

const EVENT_FILTERS: &[&str] = &[
    "accountName",
    "blockHash",
    "chainId",
    "first",
    "after",
    "maxHeight",
    "minHeight",
    "minimumDepth",
    "qualifiedName",
    "pactId",
];

/// Reject filter keys the query does not declare
fn filters(capability: &str, raw: Map<String, Value>, allowed: &[&str]) -> Result<Map<String, Value>> {
    if let Some(unknown) = raw.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(QueryError::InvalidArguments {
            capability: capability.to_string(),
            message: format!("unknown filter '{unknown}', expected one of: {}", allowed.join(", ")),
        });
    }
    Ok(raw)
}

fn after(reader: &ArgReader<'_>, idx: usize) -> Result<Value> {
    Ok(reader.opt_string(idx)?.map_or(Value::Null, Value::String))
}

/// One page of indexer data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOperation {
    GetBlock,
    GetBlocksFromDepth,
    GetBlocksFromHeight,
    GetTransactions,
    GetTransactionsByPublicKey,
    GetTransfers,
    GetEvents,
    GetFungibleAccount,
    GetFungibleAccountByPublicKey,
}

impl ChainOperation {
    pub const ALL: [Self; 9] = [
        Self::GetBlock,
        Self::GetBlocksFromDepth,
        Self::GetBlocksFromHeight,
        Self::GetTransactions,
        Self::GetTransactionsByPublicKey,
        Self::GetTransfers,
        Self::GetEvents,
        Self::GetFungibleAccount,
        Self::GetFungibleAccountByPublicKey,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::GetBlock => "getBlock",
            Self::GetBlocksFromDepth => "getBlocksFromDepth",
            Self::GetBlocksFromHeight => "getBlocksFromHeight",
            Self::GetTransactions => "getTransactions",
            Self::GetTransactionsByPublicKey => "getTransactionsByPublicKey",
            Self::GetTransfers => "getTransfers",
            Self::GetEvents => "getEvents",
            Self::GetFungibleAccount => "getFungibleAccount",
            Self::GetFungibleAccountByPublicKey => "getFungibleAccountByPublicKey",
        }
    }

    fn document(self) -> String {
        match self {
            Self::GetBlock => queries::GET_BLOCK.to_string(),
            Self::GetBlocksFromDepth => queries::blocks_from_depth(),
            Self::GetBlocksFromHeight => queries::blocks_from_height(),
            Self::GetTransactions => queries::transactions(),
            Self::GetTransactionsByPublicKey => queries::transactions_by_public_key(),
            Self::GetTransfers => queries::GET_TRANSFERS.to_string(),
            Self::GetEvents => queries::GET_EVENTS.to_string(),
            Self::GetFungibleAccount => queries::fungible_account(),
            Self::GetFungibleAccountByPublicKey => queries::fungible_accounts_by_public_key(),
        }
    }

    fn schema(self) -> CapabilitySchema {
        let first = |default: u64| {
            ParameterSchema::optional("first", "number", "Page size", Some(json!(default)))
        };
        let after = || ParameterSchema::optional("after", "string", "Cursor from pageInfo.endCursor", None);
        let account = || ParameterSchema::required("accountName", "string", "Account name, e.g. k:<public key>");
        let chain_id = || ParameterSchema::required("chainId", "string", "Chain id \"0\" to \"19\"");
        let public_key = || ParameterSchema::required("publicKey", "string", "Public key");

        let (description, parameters) = match self {
            Self::GetBlock => (
                "returns a block by hash with miner, transactions and events",
                vec![ParameterSchema::required("hash", "string", "Block hash")],
            ),
            Self::GetBlocksFromDepth => (
                "returns blocks at least minimumDepth behind the chain tip",
                vec![
                    ParameterSchema::required("minimumDepth", "number", "Depth from the latest block"),
                    first(20),
                ],
            ),
            Self::GetBlocksFromHeight => (
                "returns blocks starting at startHeight",
                vec![ParameterSchema::required("startHeight", "number", "Block height"), first(20)],
            ),
            Self::GetTransactions => (
                "returns transactions matching the filters",
                vec![ParameterSchema::optional(
                    "filters",
                    "object",
                    &format!("Any of: {}", TRANSACTION_FILTERS.join(", ")),
                    None,
                )],
            ),
            Self::GetTransactionsByPublicKey => (
                "returns transactions signed by a public key",
                vec![public_key(), first(10), after()],
            ),
            Self::GetTransfers => (
                "returns token transfers for an account",
                vec![account(), chain_id(), first(10), after()],
            ),
            Self::GetEvents => (
                "returns events matching the filters",
                vec![ParameterSchema::optional(
                    "filters",
                    "object",
                    &format!("Any of: {}", EVENT_FILTERS.join(", ")),
                    None,
                )],
            ),
            Self::GetFungibleAccount => (
                "returns balances, tokens and guard of a fungible account",
                vec![account(), chain_id()],
            ),
            Self::GetFungibleAccountByPublicKey => (
                "returns fungible accounts owned by a public key",
                vec![public_key(), chain_id(), first(10), after()],
            ),
        };

        CapabilitySchema {
            name: self.name().into(),
            description: description.into(),
            parameters,
            category: Some(CATEGORY.into()),
        }
    }

    fn variables(self, args: &[Value]) -> Result<Value> {
        let name = self.name();
        let r = ArgReader::new(name, args);
        Ok(match self {
            Self::GetBlock => json!({"hash": r.string(0)?}),
            Self::GetBlocksFromDepth => json!({"minimumDepth": r.u64_or(0, 0)?, "first": r.u64_or(1, 20)?}),
            Self::GetBlocksFromHeight => json!({"startHeight": r.u64_or(0, 0)?, "first": r.u64_or(1, 20)?}),
            Self::GetTransactions => Value::Object(filters(name, r.object(0)?, TRANSACTION_FILTERS)?),
            Self::GetTransactionsByPublicKey => {
                json!({"publicKey": r.string(0)?, "first": r.u64_or(1, 10)?, "after": after(&r, 2)?})
            }
            Self::GetTransfers => json!({
                "accountName": r.string(0)?,
                "chainId": r.string(1)?,
                "first": r.u64_or(2, 10)?,
                "after": after(&r, 3)?,
            }),
            Self::GetEvents => Value::Object(filters(name, r.object(0)?, EVENT_FILTERS)?),
            Self::GetFungibleAccount => json!({"accountName": r.string(0)?, "chainId": r.string(1)?}),
            Self::GetFungibleAccountByPublicKey => json!({
                "publicKey": r.string(0)?,
                "chainId": r.string(1)?,
                "first": r.u64_or(2, 10)?,
                "after": after(&r, 3)?,
            }),
        })
    }
}

pub struct ChainQuery {
    operation: ChainOperation,
    chain: Arc<dyn ChainIndexer>,
}

impl ChainQuery {
    pub fn new(operation: ChainOperation, chain: Arc<dyn ChainIndexer>) -> Self {
        Self { operation, chain }
    }
}

#[async_trait]
impl Capability for ChainQuery {
    fn schema(&self) -> CapabilitySchema {
        self.operation.schema()
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let variables = self.operation.variables(args)?;
        Ok(self.chain.execute(&self.operation.document(), variables).await?)
    }
}

/// Cursor-walking variants returning every node across pages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagedOperation {
    AllTransactions,
    AllTransfers,
    AllEvents,
}

impl PagedOperation {
    pub const ALL: [Self; 3] = [Self::AllTransactions, Self::AllTransfers, Self::AllEvents];

    /// Pages read when the plan gives no `maxPages`
    pub const DEFAULT_MAX_PAGES: u64 = 10;

    pub const fn name(self) -> &'static str {
        match self {
            Self::AllTransactions => "getAllTransactions",
            Self::AllTransfers => "getAllTransfers",
            Self::AllEvents => "getAllEvents",
        }
    }

    const fn page(self) -> ChainOperation {
        match self {
            Self::AllTransactions => ChainOperation::GetTransactions,
            Self::AllTransfers => ChainOperation::GetTransfers,
            Self::AllEvents => ChainOperation::GetEvents,
        }
    }

    fn schema(self) -> CapabilitySchema {
        let max_pages = ParameterSchema::optional(
            "maxPages",
            "number",
            "Maximum pages to read",
            Some(json!(Self::DEFAULT_MAX_PAGES)),
        );

        let (description, mut parameters) = match self {
            Self::AllTransactions => (
                "returns every transaction node matching the filters, across pages",
                vec![ParameterSchema::optional(
                    "filters",
                    "object",
                    &format!("Any of: {}", TRANSACTION_FILTERS.join(", ")),
                    None,
                )],
            ),
            Self::AllTransfers => (
                "returns every transfer node for an account, across pages",
                vec![
                    ParameterSchema::required("accountName", "string", "Account name"),
                    ParameterSchema::required("chainId", "string", "Chain id"),
                ],
            ),
            Self::AllEvents => (
                "returns every event node matching the filters, across pages",
                vec![ParameterSchema::optional(
                    "filters",
                    "object",
                    &format!("Any of: {}", EVENT_FILTERS.join(", ")),
                    None,
                )],
            ),
        };
        parameters.push(max_pages);

        CapabilitySchema {
            name: self.name().into(),
            description: description.into(),
            parameters,
            category: Some(CATEGORY.into()),
        }
    }

    /// Initial variables and the `maxPages` argument
    fn start(self, args: &[Value]) -> Result<(Map<String, Value>, u64)> {
        let name = self.name();
        let r = ArgReader::new(name, args);
        match self {
            Self::AllTransactions => Ok((filters(name, r.object(0)?, TRANSACTION_FILTERS)?, r.u64_or(1, Self::DEFAULT_MAX_PAGES)?)),
            Self::AllEvents => Ok((filters(name, r.object(0)?, EVENT_FILTERS)?, r.u64_or(1, Self::DEFAULT_MAX_PAGES)?)),
            Self::AllTransfers => {
                let mut params = Map::new();
                params.insert("accountName".into(), Value::String(r.string(0)?));
                params.insert("chainId".into(), Value::String(r.string(1)?));
                params.insert("first".into(), json!(10));
                Ok((params, r.u64_or(2, Self::DEFAULT_MAX_PAGES)?))
            }
        }
    }
}

pub struct PagedChainQuery {
    operation: PagedOperation,
    chain: Arc<dyn ChainIndexer>,
}

impl PagedChainQuery {
    pub fn new(operation: PagedOperation, chain: Arc<dyn ChainIndexer>) -> Self {
        Self { operation, chain }
    }
}

#[async_trait]
impl Capability for PagedChainQuery {
    fn schema(&self) -> CapabilitySchema {
        self.operation.schema()
    }

    async fn invoke(&self, args: &[Value]) -> Result<Value> {
        let (params, max_pages) = self.operation.start(args)?;
        let document = self.operation.page().document();
        let chain = &self.chain;
        let document = document.as_str();

        let nodes = paginate(
            |params| async move {
                chain
                    .execute(document, Value::Object(params))
                    .await
                    .map_err(QueryError::from)
            },
            params,
            Some(usize::try_from(max_pages).unwrap_or(usize::MAX)),
        )
        .await?;

        tracing::debug!(capability = self.operation.name(), nodes = nodes.len(), "Paged query finished");
        Ok(Value::Array(nodes))
    }
}
