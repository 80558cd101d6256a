use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::role::RoleId;

/// A document or entity returned by the index for an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedItem {
    /// Index document identifier
    pub id: String,

    /// Display label
    pub name: String,

    /// When the item was added to the index
    pub created_at: DateTime<Utc>,

    /// Role that uploaded the item, if known
    #[serde(default)]
    pub uploader_id: Option<RoleId>,

    /// Collection the item belongs to
    #[serde(default)]
    pub collection_id: Option<i64>,

    /// Entity schema (e.g. "Thing", "Document")
    #[serde(default)]
    pub schema: Option<String>,

    /// Any other fields carried by the index record
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}
