//! Search backend request and response types.
//!
//! The query DSL is a closed set of clause kinds. Each [`SearchTerm`] variant
//! has exactly one JSON shape, produced by its arm in [`SearchTerm::to_json`].

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

// ---------------------------------------------------------------------------
// Query clauses
// ---------------------------------------------------------------------------

/// Bounds of a range clause. Unset bounds are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    /// Strictly greater than.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    /// Greater than or equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    /// Strictly less than.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    /// Less than or equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

/// Boolean composite clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Clauses that must all match.
    pub must: Vec<SearchTerm>,
    /// Clauses that must not match.
    pub must_not: Vec<SearchTerm>,
    /// Clauses of which at least one must match.
    pub should: Vec<SearchTerm>,
}

impl BoolQuery {
    /// Whether the composite carries no clause at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty() && self.should.is_empty()
    }
}

/// A single search query clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    /// Exact match on a single value.
    Term {
        /// Field name.
        field: String,
        /// Value to match.
        value: Value,
    },
    /// Exact match on any of several values.
    Terms {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Range comparison.
    Range {
        /// Field name.
        field: String,
        /// Range bounds.
        bounds: RangeBounds,
    },
    /// Field is present and non-null.
    Exists {
        /// Field name.
        field: String,
    },
    /// Glob-style match using `*` and `?`.
    Wildcard {
        /// Field name.
        field: String,
        /// Pattern in the engine's wildcard syntax.
        pattern: String,
    },
    /// Nested boolean composite.
    Bool(BoolQuery),
}

impl SearchTerm {
    /// Render the clause in the engine's JSON query DSL.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Term { field, value } => json!({ "term": { field: value } }),
            Self::Terms { field, values } => json!({ "terms": { field: values } }),
            Self::Range { field, bounds } => json!({ "range": { field: bounds } }),
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Wildcard { field, pattern } => {
                json!({ "wildcard": { field: { "value": pattern } } })
            }
            Self::Bool(query) => {
                let mut body = Map::new();
                let mut put = |key: &str, terms: &[SearchTerm]| {
                    if !terms.is_empty() {
                        body.insert(
                            key.to_owned(),
                            Value::Array(terms.iter().map(Self::to_json).collect()),
                        );
                    }
                };
                put("must", &query.must);
                put("must_not", &query.must_not);
                put("should", &query.should);
                if !query.should.is_empty() {
                    body.insert("minimum_should_match".to_owned(), json!(1));
                }
                json!({ "bool": body })
            }
        }
    }
}

impl Serialize for SearchTerm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One sort clause, rendered as `{"<field>": {"order": "asc"}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

impl Serialize for SortClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &json!({ "order": self.order }))?;
        map.end()
    }
}

/// Body of a `_search` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchBody {
    /// Root query clause. Absent means match everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SearchTerm>,
    /// Sort clauses in priority order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortClause>,
    /// Projected fields.
    #[serde(rename = "_source", skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    /// Offset of the first hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,
    /// Maximum number of hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// A `_search` request against one or more indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Comma-joined index names.
    pub index: String,
    /// Request body.
    pub body: SearchBody,
}

/// A `_search` response, already reduced to hit sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// `_source` of every returned hit.
    #[serde(default)]
    pub hits: Vec<Value>,
    /// Total number of matching documents reported by the engine.
    #[serde(default)]
    pub total: u64,
}
