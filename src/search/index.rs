//! Search index management and query execution

use crate::search::client::{IndexClient, RawHit, SearchHits};
use crate::search::config::SearchConfig;
use crate::search::document::{build_entity_schema, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{AlertQuery, Clause, QueryFragment};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, Query, QueryClone, RangeQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

/// Manages the Tantivy entity index
pub struct IndexManager {
    /// The Tantivy index
    index: Index,

    /// The schema
    schema: Schema,

    /// Index writer (wrapped in RwLock for thread-safety)
    writer: Arc<RwLock<IndexWriter>>,

    /// Index reader
    reader: IndexReader,

    /// Configuration
    config: SearchConfig,
}

impl IndexManager {
    /// Create a new IndexManager
    pub async fn new(config: SearchConfig) -> SearchResult<Self> {
        let schema = build_entity_schema();

        let index = if config.in_memory {
            Index::create_in_ram(schema.clone())
        } else {
            // Create index directory if it doesn't exist
            std::fs::create_dir_all(&config.index_path).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
            })?;

            if Self::index_exists(&config.index_path) {
                Index::open_in_dir(&config.index_path).map_err(|e| {
                    SearchError::IndexInitFailed(format!("Failed to open existing index: {}", e))
                })?
            } else {
                Index::create_in_dir(&config.index_path, schema.clone()).map_err(|e| {
                    SearchError::IndexInitFailed(format!("Failed to create new index: {}", e))
                })?
            }
        };

        // Create index writer
        let writer = index
            .writer(config.writer_heap_size)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create writer: {}", e)))?;

        // Reloaded explicitly after each commit
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        tracing::info!(in_memory = config.in_memory, path = ?config.index_path, "Entity index ready");

        Ok(Self {
            index,
            schema,
            writer: Arc::new(RwLock::new(writer)),
            reader,
            config,
        })
    }

    /// Check if an index exists at the given path
    fn index_exists(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    /// Get the schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get the index
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get the reader
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    fn field(&self, name: &str) -> SearchResult<Field> {
        self.schema
            .get_field(name)
            .map_err(|_| SearchError::SchemaError(format!("Unknown field: {}", name)))
    }

    fn commit_locked(&self, writer: &mut IndexWriter) -> SearchResult<()> {
        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit: {}", e)))?;
        self.reader.reload()?;
        Ok(())
    }

    /// Index a single document, replacing any with the same ID
    pub async fn index_document<D: SearchDocument>(&self, document: &D) -> SearchResult<()> {
        let tantivy_doc = document.to_tantivy_doc(&self.schema);
        let id_field = self.field("id")?;

        let mut writer = self.writer.write().await;
        writer.delete_term(Term::from_field_text(id_field, &document.document_id()));
        writer
            .add_document(tantivy_doc)
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to add document: {}", e)))?;

        if self.config.realtime_indexing {
            self.commit_locked(&mut writer)?;
        }

        Ok(())
    }

    /// Index multiple documents and commit once
    pub async fn index_documents<D: SearchDocument>(&self, documents: &[D]) -> SearchResult<usize> {
        let id_field = self.field("id")?;
        let mut writer = self.writer.write().await;
        let mut indexed = 0;

        for document in documents {
            writer.delete_term(Term::from_field_text(id_field, &document.document_id()));
            writer.add_document(document.to_tantivy_doc(&self.schema)).map_err(|e| {
                SearchError::IndexingFailed(format!("Failed to add document {}: {}", indexed, e))
            })?;
            indexed += 1;
        }

        self.commit_locked(&mut writer)?;
        Ok(indexed)
    }

    /// Delete a document by ID
    pub async fn delete_document(&self, document_id: &str) -> SearchResult<()> {
        let id_field = self.field("id")?;
        let mut writer = self.writer.write().await;
        writer.delete_term(Term::from_field_text(id_field, document_id));

        if self.config.realtime_indexing {
            self.commit_locked(&mut writer)?;
        }

        Ok(())
    }

    /// Commit pending changes
    pub async fn commit(&self) -> SearchResult<()> {
        let mut writer = self.writer.write().await;
        self.commit_locked(&mut writer)
    }

    /// Number of searchable documents
    pub fn document_count(&self) -> SearchResult<usize> {
        let searcher = self.reader.searcher();
        searcher
            .search(&AllQuery, &Count)
            .map_err(|e| SearchError::SearchFailed(format!("Failed to count documents: {}", e)))
    }
}

/// [`IndexClient`] executing alert queries against an [`IndexManager`]
#[derive(Clone)]
pub struct TantivyIndexClient {
    manager: Arc<IndexManager>,
    index_name: String,
}

impl TantivyIndexClient {
    /// Serve the index under `index_name`
    pub fn new(manager: Arc<IndexManager>, index_name: impl Into<String>) -> Self {
        Self {
            manager,
            index_name: index_name.into(),
        }
    }

    /// Filter clauses combined into one query; no filters matches everything
    fn filter_query(&self, clauses: &[Clause]) -> SearchResult<Box<dyn Query>> {
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for clause in clauses {
            match clause {
                Clause::Range { field, gt, lte } => {
                    self.manager.field(field)?;
                    if gt.is_some() || lte.is_some() {
                        let lower = gt.map_or(Bound::Unbounded, |at| Bound::Excluded(at.timestamp_micros()));
                        let upper = lte.map_or(Bound::Unbounded, |at| Bound::Included(at.timestamp_micros()));
                        subqueries.push((
                            Occur::Must,
                            Box::new(RangeQuery::new_i64_bounds(field.clone(), lower, upper)),
                        ));
                    }
                }
                Clause::Fragment(fragment) => {
                    subqueries.push((Occur::Must, self.fragment_query(fragment)?));
                }
                Clause::SimpleQueryString { .. } => {
                    return Err(SearchError::UnsupportedQuery(
                        "text clauses are only supported in should".to_string(),
                    ))
                }
            }
        }

        if subqueries.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(subqueries)))
        }
    }

    /// Supports `match_all` and `terms` over numeric or string fields
    fn fragment_query(&self, fragment: &QueryFragment) -> SearchResult<Box<dyn Query>> {
        let object = fragment
            .as_json()
            .as_object()
            .filter(|object| object.len() == 1)
            .ok_or_else(|| SearchError::UnsupportedQuery(fragment.as_json().to_string()))?;

        if object.contains_key("match_all") {
            return Ok(Box::new(AllQuery));
        }

        let terms = object
            .get("terms")
            .and_then(|terms| terms.as_object())
            .filter(|terms| terms.len() == 1)
            .ok_or_else(|| SearchError::UnsupportedQuery(fragment.as_json().to_string()))?;

        let (name, values) = terms
            .iter()
            .next()
            .ok_or_else(|| SearchError::UnsupportedQuery(fragment.as_json().to_string()))?;
        let field = self.manager.field(name)?;
        let values = values
            .as_array()
            .ok_or_else(|| SearchError::UnsupportedQuery(fragment.as_json().to_string()))?;

        if values.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(values.len());
        for value in values {
            let term = match value {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(|n| Term::from_field_i64(field, n))
                    .ok_or_else(|| SearchError::UnsupportedQuery(format!("terms value {}", n)))?,
                serde_json::Value::String(s) => Term::from_field_text(field, s),
                other => {
                    return Err(SearchError::UnsupportedQuery(format!("terms value {}", other)))
                }
            };
            subqueries.push((
                Occur::Should,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        Ok(Box::new(BooleanQuery::new(subqueries)))
    }

    /// Distinct analyzed terms of `text` for `field`
    fn analyze(&self, field: Field, text: &str) -> SearchResult<BTreeSet<String>> {
        let mut analyzer = self.manager.index().tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);

        let mut terms = BTreeSet::new();
        while stream.advance() {
            terms.insert(stream.token().text.clone());
        }
        Ok(terms)
    }

    /// Documents within `filter` that satisfy one text clause, with their score
    fn text_matches(
        &self,
        clause: &Clause,
        filter: &dyn Query,
        searcher: &tantivy::Searcher,
    ) -> SearchResult<HashMap<DocAddress, f32>> {
        let Clause::SimpleQueryString {
            query,
            fields,
            minimum_should_match,
            ..
        } = clause
        else {
            return Err(SearchError::UnsupportedQuery(
                "only text clauses are supported in should".to_string(),
            ));
        };

        let fields: Vec<Field> = fields
            .iter()
            .map(|name| self.manager.field(name))
            .collect::<SearchResult<_>>()?;

        let mut terms = BTreeSet::new();
        for field in &fields {
            terms.extend(self.analyze(*field, query)?);
        }

        let required = minimum_should_match.required(terms.len());
        if required == 0 {
            return Ok(HashMap::new());
        }

        let mut counts: HashMap<DocAddress, usize> = HashMap::new();
        for term in &terms {
            let per_field: Vec<(Occur, Box<dyn Query>)> = fields
                .iter()
                .map(|field| {
                    let query: Box<dyn Query> = Box::new(TermQuery::new(
                        Term::from_field_text(*field, term),
                        IndexRecordOption::Basic,
                    ));
                    (Occur::Should, query)
                })
                .collect();

            let term_query = BooleanQuery::new(vec![
                (Occur::Must, Box::new(BooleanQuery::new(per_field)) as Box<dyn Query>),
                (Occur::Must, filter.box_clone()),
            ]);

            let docs: HashSet<DocAddress> = searcher
                .search(&term_query, &DocSetCollector)
                .map_err(|e| SearchError::SearchFailed(e.to_string()))?;
            for doc in docs {
                *counts.entry(doc).or_default() += 1;
            }
        }

        let total = terms.len() as f32;
        Ok(counts
            .into_iter()
            .filter(|(_, matched)| *matched >= required)
            .map(|(doc, matched)| (doc, matched as f32 / total))
            .collect())
    }

    fn execute(&self, query: &AlertQuery) -> SearchResult<SearchHits> {
        let searcher = self.manager.reader().searcher();
        let filter = self.filter_query(&query.bool_query.filter)?;

        let candidates: HashMap<DocAddress, f32> = if query.bool_query.should.is_empty() {
            searcher
                .search(filter.as_ref(), &DocSetCollector)
                .map_err(|e| SearchError::SearchFailed(e.to_string()))?
                .into_iter()
                .map(|doc| (doc, 1.0))
                .collect()
        } else {
            let mut satisfied: HashMap<DocAddress, (usize, f32)> = HashMap::new();
            for clause in &query.bool_query.should {
                for (doc, score) in self.text_matches(clause, filter.as_ref(), &searcher)? {
                    let entry = satisfied.entry(doc).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += score;
                }
            }

            let required = query.bool_query.minimum_should_match.max(1);
            satisfied
                .into_iter()
                .filter(|(_, (count, _))| *count >= required)
                .map(|(doc, (_, score))| (doc, score))
                .collect()
        };

        let total = candidates.len();
        let mut ranked: Vec<(DocAddress, f32)> = candidates.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(query.size);

        let id_field = self.manager.field("id")?;
        let source_field = self.manager.field("source")?;

        let mut hits = Vec::with_capacity(ranked.len());
        for (address, score) in ranked {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| SearchError::SearchFailed(format!("Failed to retrieve doc: {}", e)))?;

            let id = doc
                .get_first(id_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            // An unreadable body is passed on and rejected when unpacked
            let source = doc
                .get_first(source_field)
                .and_then(|v| v.as_str())
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::Value::Null);

            hits.push(RawHit { id, score, source });
        }

        Ok(SearchHits { hits, total })
    }
}

#[async_trait]
impl IndexClient for TantivyIndexClient {
    async fn search(&self, index: &str, query: &AlertQuery) -> SearchResult<SearchHits> {
        if index != self.index_name {
            return Err(SearchError::IndexNotFound(index.to_string()));
        }

        // tantivy searches block; keep them off the async workers
        let client = self.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || client.execute(&query))
            .await
            .map_err(|e| SearchError::SearchFailed(format!("Search task failed: {}", e)))?
    }
}
