//! Collaborator traits for the two backend families.
//!
//! Implementations own transport, authentication and connection lifecycle.
//! Calls are blocking; the query layer never spawns work of its own.

use std::collections::HashMap;

use nosql_select_model::{
    AttributeValue, BackendError, Item, QueryInput, QueryOutput, ScanInput, ScanOutput,
    SearchRequest, SearchResponse, TableDescription,
};

/// A partition/sort-key document store with cursor-based pages.
pub trait KeyValueBackend {
    /// Describe a table, including its secondary indexes.
    fn describe_table(&self, table_name: &str) -> Result<TableDescription, BackendError>;

    /// Run an indexed query.
    fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError>;

    /// Run a full scan.
    fn scan(&self, input: ScanInput) -> Result<ScanOutput, BackendError>;
}

/// A full-text search engine.
pub trait SearchBackend {
    /// Run a search request.
    fn search(&self, request: SearchRequest) -> Result<SearchResponse, BackendError>;
}

impl<T: KeyValueBackend + ?Sized> KeyValueBackend for &T {
    fn describe_table(&self, table_name: &str) -> Result<TableDescription, BackendError> {
        (**self).describe_table(table_name)
    }

    fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError> {
        (**self).query(input)
    }

    fn scan(&self, input: ScanInput) -> Result<ScanOutput, BackendError> {
        (**self).scan(input)
    }
}

impl<T: SearchBackend + ?Sized> SearchBackend for &T {
    fn search(&self, request: SearchRequest) -> Result<SearchResponse, BackendError> {
        (**self).search(request)
    }
}

/// Opaque continuation token: the key of the last item a bounded page read.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor(HashMap<String, AttributeValue>);

impl PageCursor {
    /// Wrap a backend's last-evaluated key. An empty key means the read is
    /// exhausted and yields `None`.
    #[must_use]
    pub fn from_last_key(key: HashMap<String, AttributeValue>) -> Option<Self> {
        (!key.is_empty()).then_some(Self(key))
    }

    /// Cursor positioned just after `item`, keyed on `key_fields`. `None`
    /// when the item lacks one of them.
    #[must_use]
    pub fn after_item(item: &Item, key_fields: &[String]) -> Option<Self> {
        let key = key_fields
            .iter()
            .map(|field| item.get(field).map(|v| (field.clone(), v.clone())))
            .collect::<Option<HashMap<_, _>>>()?;
        Self::from_last_key(key)
    }

    /// The key to pass as the exclusive start of the next read.
    #[must_use]
    pub fn into_start_key(self) -> HashMap<String, AttributeValue> {
        self.0
    }

    /// Borrow the underlying key.
    #[must_use]
    pub fn as_key(&self) -> &HashMap<String, AttributeValue> {
        &self.0
    }
}
