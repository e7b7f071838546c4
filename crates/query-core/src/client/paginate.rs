//! Cursor pagination driver
//!
//! Paged queries return `{ <resultKey>: { edges: [{ node }], pageInfo } }`.
//! The driver reads the first top-level key, so it works for any named
//! connection.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

/// Continuation info reported by every page
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Edge {
    pub node: Value,
}

/// One page of a named edge list
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl Connection {
    /// Extract the connection stored under the first top-level key
    pub fn from_response(data: Value) -> Result<Self> {
        let Value::Object(map) = data else {
            return Err(QueryError::ExternalApi(
                "paged response is not an object".into(),
            ));
        };

        let (key, connection) = map
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::ExternalApi("paged response is empty".into()))?;

        serde_json::from_value(connection).map_err(|e| {
            QueryError::ExternalApi(format!("'{key}' is not a paged connection: {e}"))
        })
    }
}

/// Call `query` page by page, following `pageInfo.endCursor` through
/// `params.after`, until the source reports no further page or `max_pages`
/// pages have been read. Any page failure aborts the whole walk.
pub async fn paginate<F, Fut>(
    mut query: F,
    initial_params: Map<String, Value>,
    max_pages: Option<usize>,
) -> Result<Vec<Value>>
where
    F: FnMut(Map<String, Value>) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut params = initial_params;
    let mut nodes = Vec::new();
    let mut pages = 0usize;
    let mut has_next_page = true;

    while has_next_page && max_pages.is_none_or(|max| pages < max) {
        let page = Connection::from_response(query(params.clone()).await?)?;
        pages += 1;

        nodes.extend(page.edges.into_iter().map(|edge| edge.node));
        has_next_page = page.page_info.has_next_page;

        match page.page_info.end_cursor {
            Some(cursor) if has_next_page => {
                params.insert("after".into(), Value::String(cursor));
            }
            // A page that claims more data without a cursor would loop forever.
            None if has_next_page => {
                tracing::warn!(pages, "Page reported hasNextPage without endCursor; stopping");
                has_next_page = false;
            }
            _ => {}
        }
    }

    tracing::debug!(pages, nodes = nodes.len(), "Pagination finished");
    Ok(nodes)
}
