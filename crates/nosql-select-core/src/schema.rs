//! Table metadata used to classify key conditions.
//!
//! [`SchemaInfo`] is built from the backend's `DescribeTable` payload on every
//! compilation and is never cached, so it always reflects the live table.

use std::collections::{BTreeMap, BTreeSet};

use nosql_select_model::{BackendError, KeySchemaElement, KeyType, TableDescription};
use tracing::warn;

use crate::error::{QueryError, QueryResult};

/// Partition and optional sort key of a table or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (hash) key attribute.
    pub partition_key: String,
    /// Sort (range) key attribute, if any.
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Extract the key schema from wire key elements. `None` when there is no
    /// partition key.
    #[must_use]
    pub fn from_elements(elements: &[KeySchemaElement]) -> Option<Self> {
        let find = |kind: KeyType| {
            elements
                .iter()
                .find(|e| e.key_type == kind)
                .map(|e| e.attribute_name.clone())
        };
        Some(Self {
            partition_key: find(KeyType::Hash)?,
            sort_key: find(KeyType::Range),
        })
    }

    /// Whether `field` is one of the key attributes.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.partition_key == field || self.sort_key.as_deref() == Some(field)
    }

    /// The key attribute names.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<&str> {
        std::iter::once(self.partition_key.as_str())
            .chain(self.sort_key.as_deref())
            .collect()
    }
}

/// Key metadata of one table and its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    /// Every attribute the table declares.
    pub fields: BTreeSet<String>,
    /// The table's primary key.
    pub primary_key: KeySchema,
    /// Secondary indexes by name.
    pub indexes: BTreeMap<String, KeySchema>,
}

impl SchemaInfo {
    /// Build schema metadata from a `DescribeTable` response.
    pub fn from_table_description(desc: &TableDescription) -> QueryResult<Self> {
        let table = desc.table_name.as_deref().unwrap_or("<unnamed>");
        let primary_key = KeySchema::from_elements(&desc.key_schema).ok_or_else(|| {
            QueryError::Backend(BackendError::validation(format!(
                "table {table} has no partition key"
            )))
        })?;

        let mut indexes = BTreeMap::new();
        for index in desc
            .global_secondary_indexes
            .iter()
            .chain(&desc.local_secondary_indexes)
        {
            match KeySchema::from_elements(&index.key_schema) {
                Some(keys) => {
                    indexes.insert(index.index_name.clone(), keys);
                }
                None => warn!(
                    table,
                    index = %index.index_name,
                    "index has no partition key, ignoring"
                ),
            }
        }

        let mut fields: BTreeSet<String> = desc
            .attribute_definitions
            .iter()
            .map(|d| d.attribute_name.clone())
            .collect();
        fields.extend(primary_key.fields().into_iter().map(str::to_owned));
        for keys in indexes.values() {
            fields.extend(keys.fields().into_iter().map(str::to_owned));
        }

        Ok(Self {
            fields,
            primary_key,
            indexes,
        })
    }

    /// Key schema governing a read: the index's if one is named, else the table's.
    pub fn key_schema_for(&self, index: Option<&str>) -> QueryResult<&KeySchema> {
        match index {
            None => Ok(&self.primary_key),
            Some(name) => self
                .indexes
                .get(name)
                .ok_or_else(|| QueryError::UnknownIndex {
                    index: name.to_owned(),
                }),
        }
    }
}
