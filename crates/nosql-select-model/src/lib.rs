//! Wire model types for nosql-select.
//!
//! Two backend families are described here. The key-value family mirrors the
//! DynamoDB JSON protocol (`Query`, `Scan`, `DescribeTable` and the tagged
//! `AttributeValue`). The search family mirrors an Elasticsearch `_search`
//! request with a closed set of query clauses.
// "DynamoDB" and "Elasticsearch" appear in many doc comments in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod output;
pub mod search;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use error::{BackendError, BackendErrorCode};
pub use input::{QueryInput, ScanInput};
pub use output::{QueryOutput, ScanOutput};
pub use search::{
    BoolQuery, RangeBounds, SearchBody, SearchRequest, SearchResponse, SearchTerm, SortClause,
    SortOrder,
};
pub use types::{
    AttributeDefinition, KeySchemaElement, KeyType, ScalarAttributeType,
    SecondaryIndexDescription, TableDescription,
};
