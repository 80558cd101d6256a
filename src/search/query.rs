//! Alert query model and construction
//!
//! An [`AlertQuery`] is the backend-neutral form of one alert's incremental
//! search: the saved text as a `should` clause, and the `(watermark, now]`
//! window plus the owner's authorization fragment as `filter` clauses. [`AlertQuery::to_json`]
//! renders it as an Elasticsearch-compatible request body.

use crate::config::ScannerConfig;
use crate::models::Alert;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Opaque authorization filter, included in a query verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFragment(Value);

impl QueryFragment {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Fragment that matches every document
    pub fn match_all() -> Self {
        Self(json!({ "match_all": {} }))
    }

    /// Fragment matching documents whose `field` is one of `values`
    pub fn terms(field: &str, values: impl IntoIterator<Item = i64>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Value::from).collect();

        let mut inner = Map::new();
        inner.insert(field.to_string(), Value::Array(values));

        let mut outer = Map::new();
        outer.insert("terms".to_string(), Value::Object(inner));
        Self(Value::Object(outer))
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

/// How the terms of a simple query string combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
}

/// Share of query terms a document must contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimumShouldMatch {
    Percent(u8),
}

impl MinimumShouldMatch {
    /// Terms required out of `terms` distinct query terms
    pub fn required(&self, terms: usize) -> usize {
        match self {
            MinimumShouldMatch::Percent(pct) => required_terms(terms, *pct),
        }
    }

    fn to_json(self) -> Value {
        match self {
            MinimumShouldMatch::Percent(pct) => Value::String(format!("{}%", pct)),
        }
    }
}

/// Number of terms that must match out of `terms` for a percentage rule.
///
/// Rounds up and never drops below one term, so short queries need every
/// term while a ten-term query at 90% tolerates one miss.
pub fn required_terms(terms: usize, pct: u8) -> usize {
    if terms == 0 {
        return 0;
    }

    let pct = usize::from(pct.min(100));
    let required = (terms * pct).div_ceil(100);
    required.clamp(1, terms)
}

/// One clause of a boolean alert query
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Free-text match of the saved query
    SimpleQueryString {
        query: String,
        fields: Vec<String>,
        default_operator: Operator,
        minimum_should_match: MinimumShouldMatch,
    },

    /// Timestamp window: exclusive lower and inclusive upper bound, `None` is unbounded
    Range {
        field: String,
        gt: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },

    /// Authorization fragment, passed through untouched
    Fragment(QueryFragment),
}

impl Clause {
    pub fn to_json(&self) -> Value {
        match self {
            Clause::SimpleQueryString {
                query,
                fields,
                default_operator,
                minimum_should_match,
            } => json!({
                "simple_query_string": {
                    "query": query,
                    "fields": fields,
                    "default_operator": default_operator,
                    "minimum_should_match": minimum_should_match.to_json(),
                }
            }),
            Clause::Range { field, gt, lte } => {
                let mut bounds = Map::new();
                for (name, bound) in [("gt", gt), ("lte", lte)] {
                    if let Some(at) = bound {
                        bounds.insert(
                            name.to_string(),
                            Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                        );
                    }
                }

                let mut range = Map::new();
                range.insert(field.clone(), Value::Object(bounds));
                json!({ "range": range })
            }
            Clause::Fragment(fragment) => fragment.as_json().clone(),
        }
    }
}

/// Boolean combination: at least `minimum_should_match` of `should`, all of `filter`
#[derive(Debug, Clone, PartialEq)]
pub struct BoolQuery {
    pub should: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub minimum_should_match: usize,
}

/// One alert's incremental, authorization-scoped search
#[derive(Debug, Clone, PartialEq)]
pub struct AlertQuery {
    /// Maximum number of hits returned
    pub size: usize,
    pub bool_query: BoolQuery,
}

impl AlertQuery {
    /// Watermark bound carried by the filter clause, if any
    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.bool_query.filter.iter().find_map(|clause| match clause {
            Clause::Range { gt, .. } => *gt,
            _ => None,
        })
    }

    /// Cycle time the window ends at, if any
    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.bool_query.filter.iter().find_map(|clause| match clause {
            Clause::Range { lte, .. } => *lte,
            _ => None,
        })
    }

    /// Render as an Elasticsearch request body
    pub fn to_json(&self) -> Value {
        let should: Vec<Value> = self.bool_query.should.iter().map(Clause::to_json).collect();
        let filter: Vec<Value> = self.bool_query.filter.iter().map(Clause::to_json).collect();

        json!({
            "size": self.size,
            "query": {
                "bool": {
                    "should": should,
                    "filter": filter,
                    "minimum_should_match": self.bool_query.minimum_should_match,
                }
            }
        })
    }
}

/// Builds the per-alert index query
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    text_field: String,
    created_at_field: String,
    max_page_size: usize,
    minimum_should_match: MinimumShouldMatch,
}

impl QueryBuilder {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            text_field: config.text_field.clone(),
            created_at_field: config.created_at_field.clone(),
            max_page_size: config.max_page_size,
            minimum_should_match: MinimumShouldMatch::Percent(config.minimum_should_match_percent),
        }
    }

    /// Build the query for `alert`, scoped by the owner's `authz` fragment.
    ///
    /// `now` becomes the alert's next watermark, so the window ends there and
    /// the following cycle starts right after it.
    pub fn build(&self, alert: &Alert, now: DateTime<Utc>, authz: QueryFragment) -> AlertQuery {
        let text = Clause::SimpleQueryString {
            query: alert.query.clone(),
            fields: vec![self.text_field.clone()],
            default_operator: Operator::And,
            minimum_should_match: self.minimum_should_match,
        };

        let window = Clause::Range {
            field: self.created_at_field.clone(),
            gt: alert.notified_at,
            lte: Some(now),
        };

        AlertQuery {
            size: self.max_page_size,
            bool_query: BoolQuery {
                should: vec![text],
                filter: vec![window, Clause::Fragment(authz)],
                minimum_should_match: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(&ScannerConfig::default())
    }

    #[test]
    fn test_query_shape() {
        let watermark = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let alert = Alert::new(Uuid::new_v4(), "foo bar").with_notified_at(watermark);
        let authz = QueryFragment::terms("collection_id", [1, 2]);
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        let query = builder().build(&alert, now, authz);

        assert_eq!(
            query.to_json(),
            json!({
                "size": 9999,
                "query": {
                    "bool": {
                        "should": [{
                            "simple_query_string": {
                                "query": "foo bar",
                                "fields": ["text"],
                                "default_operator": "AND",
                                "minimum_should_match": "90%",
                            }
                        }],
                        "filter": [
                            {"range": {"created_at": {
                                "gt": "2024-01-01T00:00:00.000000Z",
                                "lte": "2024-01-02T12:00:00.000000Z",
                            }}},
                            {"terms": {"collection_id": [1, 2]}},
                        ],
                        "minimum_should_match": 1,
                    }
                }
            })
        );
        assert_eq!(query.lower_bound(), Some(watermark));
        assert_eq!(query.upper_bound(), Some(now));
    }

    #[test]
    fn test_unset_watermark_has_no_lower_bound() {
        let alert = Alert::new(Uuid::new_v4(), "foo");
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let query = builder().build(&alert, now, QueryFragment::match_all());

        assert_eq!(query.lower_bound(), None);
        assert_eq!(
            query.to_json()["query"]["bool"]["filter"][0],
            json!({"range": {"created_at": {"lte": "2024-01-02T12:00:00.000000Z"}}})
        );
    }

    #[test]
    fn test_fragment_is_verbatim() {
        let fragment = QueryFragment::new(json!({"bool": {"must_not": [{"term": {"x": 1}}]}}));
        let alert = Alert::new(Uuid::new_v4(), "foo");
        let query = builder().build(&alert, Utc::now(), fragment.clone());

        assert_eq!(query.bool_query.filter[1], Clause::Fragment(fragment.clone()));
        assert_eq!(&query.to_json()["query"]["bool"]["filter"][1], fragment.as_json());
    }

    #[test]
    fn test_required_terms() {
        assert_eq!(required_terms(0, 90), 0);
        assert_eq!(required_terms(1, 90), 1);
        assert_eq!(required_terms(2, 90), 2);
        assert_eq!(required_terms(10, 90), 9);
        assert_eq!(required_terms(11, 90), 10);
        assert_eq!(required_terms(3, 0), 1);
        assert_eq!(MinimumShouldMatch::Percent(50).required(4), 2);
    }
}
