//! Search document structures and indexing

use crate::models::{MatchedItem, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tantivy::schema::*;
use tantivy::TantivyDocument;

/// Trait for documents that can be indexed and searched
pub trait SearchDocument {
    /// Convert to Tantivy document
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument;

    /// Get document ID
    fn document_id(&self) -> String;
}

/// Entity record for search indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDocument {
    /// Entity ID
    pub id: String,

    /// Display label
    pub name: String,

    /// Full text matched by alert queries
    pub text: String,

    /// When the entity entered the index
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Uploading role
    #[serde(default)]
    pub uploader_id: Option<RoleId>,

    /// Owning collection
    #[serde(default)]
    pub collection_id: Option<i64>,

    /// Entity schema
    #[serde(default)]
    pub schema: Option<String>,

    /// Extra properties carried through to matched items
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl EntityDocument {
    pub fn new(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            text: text.into(),
            created_at: Utc::now(),
            uploader_id: None,
            collection_id: None,
            schema: Some("Thing".to_string()),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_collection(mut self, collection_id: i64) -> Self {
        self.collection_id = Some(collection_id);
        self
    }

    pub fn with_uploader(mut self, uploader_id: RoleId) -> Self {
        self.uploader_id = Some(uploader_id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// The record an alert hit unpacks into
    pub fn to_matched_item(&self) -> MatchedItem {
        MatchedItem {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            uploader_id: self.uploader_id,
            collection_id: self.collection_id,
            schema: self.schema.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl SearchDocument for EntityDocument {
    fn to_tantivy_doc(&self, schema: &Schema) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        if let Ok(field) = schema.get_field("id") {
            doc.add_text(field, &self.id);
        }

        if let Ok(field) = schema.get_field("name") {
            doc.add_text(field, &self.name);
        }

        if let Ok(field) = schema.get_field("text") {
            doc.add_text(field, &self.text);
        }

        // Microseconds, so sub-second watermarks compare exactly
        if let Ok(field) = schema.get_field("created_at") {
            doc.add_i64(field, self.created_at.timestamp_micros());
        }

        if let Some(uploader_id) = self.uploader_id {
            if let Ok(field) = schema.get_field("uploader_id") {
                doc.add_text(field, uploader_id.to_string());
            }
        }

        if let Some(collection_id) = self.collection_id {
            if let Ok(field) = schema.get_field("collection_id") {
                doc.add_i64(field, collection_id);
            }
        }

        if let Some(ref entity_schema) = self.schema {
            if let Ok(field) = schema.get_field("schema") {
                doc.add_text(field, entity_schema);
            }
        }

        // Stored body returned with hits
        if let Ok(field) = schema.get_field("source") {
            let source = serde_json::to_string(&self.to_matched_item()).unwrap_or_default();
            doc.add_text(field, source);
        }

        doc
    }

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

/// Build the search schema for entities
pub fn build_entity_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // ID - stored, indexed as string
    schema_builder.add_text_field("id", STRING | STORED);

    schema_builder.add_text_field("name", STRING | STORED);

    // Text - full-text indexed
    schema_builder.add_text_field("text", TEXT);

    schema_builder.add_i64_field("created_at", INDEXED | STORED | FAST);

    schema_builder.add_text_field("uploader_id", STRING | STORED);

    schema_builder.add_i64_field("collection_id", INDEXED | STORED | FAST);

    schema_builder.add_text_field("schema", STRING | STORED);

    // Source - stored JSON, not indexed
    schema_builder.add_text_field("source", STORED);

    schema_builder.build()
}
