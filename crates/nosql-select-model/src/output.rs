//! Key-value response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};

/// One page of an indexed read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    /// Items that passed the filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Length of `items`.
    #[serde(default)]
    pub count: i32,
    /// Items examined, counting those the filter dropped.
    #[serde(default)]
    pub scanned_count: i32,
    /// Key of the last examined item. Empty once the read is exhausted.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: HashMap<String, AttributeValue>,
}

/// One page of a full read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    /// Items that passed the filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Length of `items`.
    #[serde(default)]
    pub count: i32,
    /// Items examined, counting those the filter dropped.
    #[serde(default)]
    pub scanned_count: i32,
    /// Key of the last examined item. Empty once the read is exhausted.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: HashMap<String, AttributeValue>,
}

impl From<ScanOutput> for QueryOutput {
    fn from(out: ScanOutput) -> Self {
        Self {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
        }
    }
}

