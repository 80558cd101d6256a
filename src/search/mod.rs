//! Entity search for alert matching
//!
//! - [`QueryBuilder`] turns an alert and its owner's authorization fragment
//!   into a backend-neutral [`AlertQuery`]
//! - [`IndexClient`] executes it and returns one page of [`RawHit`]s
//! - [`IndexManager`] and [`TantivyIndexClient`] provide a local Tantivy
//!   index holding the entities alerts are matched against
//!
//! ```text
//! Alert + QueryFragment ──▶ QueryBuilder ──▶ AlertQuery
//!                                              │
//!                                              ▼
//!                         IndexClient::search(index, query)
//!                                              │
//!                                              ▼
//!                             SearchHits ──▶ unpack_hit ──▶ MatchedItem
//! ```

mod client;
mod config;
mod document;
mod error;
mod index;
mod query;

pub use client::{unpack_hit, IndexClient, RawHit, SearchHits};
pub use self::config::{SearchConfig, SearchConfigBuilder};
pub use document::{build_entity_schema, EntityDocument, SearchDocument};
pub use error::{SearchError, SearchResult};
pub use index::{IndexManager, TantivyIndexClient};
pub use query::{
    required_terms, AlertQuery, BoolQuery, Clause, MinimumShouldMatch, Operator, QueryBuilder,
    QueryFragment,
};
