//! Index client abstraction

use crate::models::MatchedItem;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::AlertQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw index hit before unpacking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    /// Document identifier
    pub id: String,

    /// Relevance score
    pub score: f32,

    /// Stored document body
    pub source: serde_json::Value,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub hits: Vec<RawHit>,

    /// Matching documents, including those beyond the page
    pub total: usize,
}

/// Executes alert queries against an entity index.
///
/// An error means the search did not run; zero hits is `Ok` with an empty page.
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn search(&self, index: &str, query: &AlertQuery) -> SearchResult<SearchHits>;
}

/// Turn a raw hit into a [`MatchedItem`], taking the id from the hit
pub fn unpack_hit(hit: &RawHit) -> SearchResult<MatchedItem> {
    let mut source = match &hit.source {
        serde_json::Value::Object(map) => map.clone(),
        other => {
            return Err(SearchError::Unpack {
                id: hit.id.clone(),
                reason: format!("expected an object, got {}", other),
            })
        }
    };

    source.insert("id".to_string(), serde_json::Value::String(hit.id.clone()));

    serde_json::from_value(serde_json::Value::Object(source)).map_err(|e| SearchError::Unpack {
        id: hit.id.clone(),
        reason: e.to_string(),
    })
}
