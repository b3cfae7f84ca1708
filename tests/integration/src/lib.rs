//! End-to-end tests for nosql-select.
//!
//! The adapters are driven against in-memory backends that page like the
//! real services: the key-value store caps every response and hands back a
//! last-evaluated key, the search backend honours `from`/`size`. Neither
//! evaluates conditions; tests assert on the native requests they record.

use std::collections::HashMap;
use std::sync::Once;

use nosql_select_core::backend::{KeyValueBackend, SearchBackend};
use nosql_select_model::{
    AttributeDefinition, AttributeValue, BackendError, Item, KeySchemaElement, QueryInput,
    QueryOutput, ScalarAttributeType, ScanInput, ScanOutput, SearchRequest, SearchResponse,
    SecondaryIndexDescription, TableDescription,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A `Query` call.
    Query(QueryInput),
    /// A `Scan` call.
    Scan(ScanInput),
}

impl Recorded {
    /// The `Limit` the call asked for.
    #[must_use]
    pub fn limit(&self) -> Option<i32> {
        match self {
            Self::Query(input) => input.limit,
            Self::Scan(input) => input.limit,
        }
    }
}

/// In-memory key-value table that pages its items in insertion order.
#[derive(Debug)]
pub struct MemoryStore {
    description: TableDescription,
    items: Vec<Item>,
    page_size: usize,
    honour_limit: bool,
    endless: bool,
    fail_on_call: Option<usize>,
    requests: Mutex<Vec<Recorded>>,
}

impl MemoryStore {
    /// A store serving `items` in pages of at most ten.
    #[must_use]
    pub fn new(description: TableDescription, items: Vec<Item>) -> Self {
        init_tracing();
        Self {
            description,
            items,
            page_size: 10,
            honour_limit: true,
            endless: false,
            fail_on_call: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A store that always returns one numbered item and a cursor.
    #[must_use]
    pub fn endless() -> Self {
        Self {
            endless: true,
            page_size: 1,
            ..Self::new(numbers_table(), Vec::new())
        }
    }

    /// Cap every response at `page_size` items.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Return full pages even when the request asks for fewer items.
    #[must_use]
    pub fn ignoring_limit(mut self) -> Self {
        self.honour_limit = false;
        self
    }

    /// Fail the given 1-based call with a throttling error.
    #[must_use]
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    fn serve(
        &self,
        request: Recorded,
        limit: Option<i32>,
        start: &HashMap<String, AttributeValue>,
    ) -> Result<QueryOutput, BackendError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(BackendError::throttled("provisioned throughput exceeded"));
        }

        let size = limit
            .and_then(|l| usize::try_from(l).ok())
            .filter(|_| self.honour_limit)
            .map_or(self.page_size, |l| l.min(self.page_size));

        let (items, last_evaluated_key) = if self.endless {
            let from = start
                .get("n")
                .and_then(AttributeValue::as_n)
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);
            let items: Vec<Item> = (from + 1..=from + size).map(number).collect();
            let last = number(from + size);
            (items, last)
        } else {
            let from = start.get("id").map_or(0, |id| {
                self.items
                    .iter()
                    .position(|item| item.get("id") == Some(id))
                    .map_or(self.items.len(), |pos| pos + 1)
            });
            let to = (from + size).min(self.items.len());
            let items = self.items[from..to].to_vec();
            let last = if to < self.items.len() {
                key_of(&items[items.len() - 1])
            } else {
                HashMap::new()
            };
            (items, last)
        };

        let count = i32::try_from(items.len()).unwrap_or(i32::MAX);
        Ok(QueryOutput {
            items,
            count,
            scanned_count: count,
            last_evaluated_key,
        })
    }
}

impl KeyValueBackend for MemoryStore {
    fn describe_table(&self, table_name: &str) -> Result<TableDescription, BackendError> {
        if self.description.table_name.as_deref() == Some(table_name) {
            Ok(self.description.clone())
        } else {
            Err(BackendError::resource_not_found(format!(
                "Requested resource not found: Table: {table_name} not found"
            )))
        }
    }

    fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError> {
        let limit = input.limit;
        let start = input.exclusive_start_key.clone();
        self.serve(Recorded::Query(input), limit, &start)
    }

    fn scan(&self, input: ScanInput) -> Result<ScanOutput, BackendError> {
        let limit = input.limit;
        let start = input.exclusive_start_key.clone();
        let out = self.serve(Recorded::Scan(input), limit, &start)?;
        Ok(ScanOutput {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
        })
    }
}

/// In-memory search index serving `from`/`size` windows of its documents.
#[derive(Debug)]
pub struct MemorySearch {
    documents: Vec<Value>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MemorySearch {
    /// An index holding `documents`.
    #[must_use]
    pub fn new(documents: Vec<Value>) -> Self {
        init_tracing();
        Self {
            documents,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().clone()
    }
}

impl SearchBackend for MemorySearch {
    fn search(&self, request: SearchRequest) -> Result<SearchResponse, BackendError> {
        let from = request.body.from.unwrap_or(0).min(self.documents.len());
        let size = request.body.size.unwrap_or(10);
        let to = (from + size).min(self.documents.len());
        self.requests.lock().push(request);
        Ok(SearchResponse {
            hits: self.documents[from..to].to_vec(),
            total: u64::try_from(self.documents.len()).unwrap_or(u64::MAX),
        })
    }
}

/// `users`: partition key `id`, plus a `by_category` index keyed on
/// `category` / `created`.
#[must_use]
pub fn users_table() -> TableDescription {
    TableDescription {
        table_name: Some("users".to_owned()),
        key_schema: vec![KeySchemaElement::hash("id")],
        attribute_definitions: vec![
            attribute("id", ScalarAttributeType::S),
            attribute("category", ScalarAttributeType::S),
            attribute("created", ScalarAttributeType::N),
        ],
        global_secondary_indexes: vec![SecondaryIndexDescription {
            index_name: "by_category".to_owned(),
            key_schema: vec![
                KeySchemaElement::hash("category"),
                KeySchemaElement::range("created"),
            ],
        }],
        ..TableDescription::default()
    }
}

/// `events`: partition key `device`, sort key `ts`.
#[must_use]
pub fn events_table() -> TableDescription {
    TableDescription {
        table_name: Some("events".to_owned()),
        key_schema: vec![KeySchemaElement::hash("device"), KeySchemaElement::range("ts")],
        attribute_definitions: vec![
            attribute("device", ScalarAttributeType::S),
            attribute("ts", ScalarAttributeType::N),
        ],
        ..TableDescription::default()
    }
}

/// User `n`, with ids `u01`, `u02`, ...
#[must_use]
pub fn user(n: usize) -> Item {
    HashMap::from([
        ("id".to_owned(), AttributeValue::S(format!("u{n:02}"))),
        (
            "category".to_owned(),
            AttributeValue::S(if n % 2 == 0 { "even" } else { "odd" }.to_owned()),
        ),
        ("created".to_owned(), AttributeValue::N(n.to_string())),
    ])
}

/// Users `1..=count`.
#[must_use]
pub fn users(count: usize) -> Vec<Item> {
    (1..=count).map(user).collect()
}

/// The JSON form of user `n`.
#[must_use]
pub fn user_json(n: usize) -> Value {
    json!({
        "id": format!("u{n:02}"),
        "category": if n % 2 == 0 { "even" } else { "odd" },
        "created": n,
    })
}

/// Ids of a page of JSON rows.
#[must_use]
pub fn ids(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row["id"].as_str().map(ToOwned::to_owned))
        .collect()
}

/// Ids `u{from}..=u{to}`.
#[must_use]
pub fn id_range(from: usize, to: usize) -> Vec<String> {
    (from..=to).map(|n| format!("u{n:02}")).collect()
}

fn numbers_table() -> TableDescription {
    TableDescription {
        table_name: Some("numbers".to_owned()),
        key_schema: vec![KeySchemaElement::hash("n")],
        ..TableDescription::default()
    }
}

fn number(n: usize) -> Item {
    HashMap::from([("n".to_owned(), AttributeValue::N(n.to_string()))])
}

fn key_of(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .filter(|(name, _)| name.as_str() == "id")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn attribute(name: &str, attribute_type: ScalarAttributeType) -> AttributeDefinition {
    AttributeDefinition {
        attribute_name: name.to_owned(),
        attribute_type,
    }
}

mod test_keyvalue;
mod test_pagination;
mod test_search;
