//! Lowering of a built query into each backend's native request.
//!
//! Both compilers take a [`QueryShape`] produced by
//! [`Select::build`](crate::select::Select::build) and emit a [`QueryPlan`]
//! whose payload can be handed to the backend client unmodified.

pub mod keyvalue;
pub mod search;

use nosql_select_model::SortOrder;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::expression::{BoundParameters, ConditionTree, Predicate};

pub use keyvalue::KeyValueParams;

/// How a compiled plan is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    /// Key-value read driven by a key condition.
    IndexedQuery,
    /// Key-value read over the whole table or index.
    FullScan,
    /// Search engine request.
    Search,
}

/// Compiler output: an execution method plus the native request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan<P> {
    /// Execution method.
    pub method: QueryMethod,
    /// Backend-native request parameters.
    pub native_params: P,
}

/// One ordering entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to order on.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// A fully parsed query, ready for compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryShape {
    /// Sources in the order they were named: table then index for the
    /// key-value backend, index names for the search backend.
    pub sources: Vec<String>,
    /// Explicitly selected key-value index.
    pub index: Option<String>,
    /// Combined condition, if any clause was added.
    pub condition: Option<ConditionTree>,
    /// Bound parameters referenced by the condition.
    pub params: BoundParameters,
    /// Projected fields. Empty means all.
    pub columns: Vec<String>,
    /// Ordering entries.
    pub order: Vec<OrderBy>,
    /// Requested page size. Zero means all.
    pub limit: usize,
    /// Number of leading matches to skip.
    pub skip: usize,
}

impl QueryShape {
    /// The key-value table.
    pub fn table(&self) -> QueryResult<&str> {
        self.sources
            .first()
            .map(String::as_str)
            .ok_or(QueryError::MissingSource)
    }

    /// The key-value index: the explicit one, else the second source.
    #[must_use]
    pub fn key_value_index(&self) -> Option<&str> {
        self.index
            .as_deref()
            .or_else(|| self.sources.get(1).map(String::as_str))
    }
}

/// Shape of a `LIKE` pattern once `%` wildcards are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LikePattern {
    /// No wildcard: plain equality.
    Exact(String),
    /// Trailing `%` only.
    Prefix(String),
    /// `%` at both ends only.
    Contains(String),
    /// Any other wildcard placement.
    Other(String),
}

impl LikePattern {
    pub(crate) fn classify(pattern: &str) -> Self {
        let wildcards = pattern.matches('%').count();
        if wildcards == 0 {
            return Self::Exact(pattern.to_owned());
        }
        let inner_start = usize::from(pattern.starts_with('%'));
        let inner_end = pattern.len() - usize::from(pattern.ends_with('%'));
        let leading = inner_start == 1;
        let trailing = inner_end < pattern.len();
        let inner = pattern.get(inner_start..inner_end.max(inner_start)).unwrap_or("");
        match (leading, trailing, wildcards) {
            (false, true, 1) => Self::Prefix(inner.to_owned()),
            (true, true, 2) if !inner.is_empty() => Self::Contains(inner.to_owned()),
            _ => Self::Other(pattern.to_owned()),
        }
    }
}

/// Resolve a predicate's right-hand side as a single scalar value.
pub(crate) fn scalar_value(
    predicate: &Predicate,
    params: &BoundParameters,
) -> QueryResult<Value> {
    let value = predicate
        .value
        .as_ref()
        .ok_or_else(|| QueryError::unsupported(predicate.to_string(), "missing value"))?
        .resolve(params)?;
    if value.is_array() || value.is_object() {
        return Err(QueryError::unsupported(
            predicate.to_string(),
            format!("{} expects a single value", predicate.operator),
        ));
    }
    Ok(value)
}

/// Resolve a predicate's right-hand side as a string.
pub(crate) fn string_value(
    predicate: &Predicate,
    params: &BoundParameters,
) -> QueryResult<String> {
    match scalar_value(predicate, params)? {
        Value::String(s) => Ok(s),
        _ => Err(QueryError::unsupported(
            predicate.to_string(),
            "LIKE expects a string pattern",
        )),
    }
}

/// Resolve the candidate list of an `IN` / `NOT IN` predicate.
///
/// Arrays are flattened one level. A bare string is split on commas.
pub(crate) fn list_values(
    predicate: &Predicate,
    params: &BoundParameters,
) -> QueryResult<Vec<Value>> {
    let value = predicate
        .value
        .as_ref()
        .ok_or_else(|| QueryError::unsupported(predicate.to_string(), "missing value"))?
        .resolve(params)?;
    let mut out = Vec::new();
    let mut push = |v: Value| match v {
        Value::String(s) => out.extend(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_owned())),
        ),
        other => out.push(other),
    };
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Array(inner) => inner.into_iter().for_each(&mut push),
                    other => push(other),
                }
            }
        }
        other => push(other),
    }
    if out.is_empty() {
        return Err(QueryError::unsupported(
            predicate.to_string(),
            "IN requires at least one value",
        ));
    }
    Ok(out)
}
