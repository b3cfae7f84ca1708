//! Adapters tying the builder, compilers and backends together.
//!
//! An adapter owns a backend client and the layer configuration. It hands
//! out pre-configured [`Select`] builders, compiles them against the
//! backend's schema and executes the resulting plan.

use nosql_select_model::SearchRequest;
use nosql_select_model::attribute_value::item_to_json;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::{KeyValueBackend, PageCursor, SearchBackend};
use crate::compiler::{KeyValueParams, QueryPlan, QueryShape, keyvalue, search};
use crate::config::SelectConfig;
use crate::error::QueryResult;
use crate::pagination::{ErrorMode, Page, PageRequest, PaginationEngine};
use crate::schema::SchemaInfo;
use crate::select::Select;

/// A page of results as plain JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rowset {
    /// Returned documents.
    pub items: Vec<Value>,
    /// Matching documents. The search engine reports its hit count; the
    /// key-value store only knows how many items were returned.
    pub total: u64,
}

impl Rowset {
    /// Number of documents in this page.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

impl From<Page> for Rowset {
    fn from(page: Page) -> Self {
        Self {
            total: u64::try_from(page.total_returned).unwrap_or(u64::MAX),
            items: page.items.iter().map(item_to_json).collect(),
        }
    }
}

/// Runs queries against a key-value backend.
#[derive(Debug)]
pub struct KeyValueAdapter<B> {
    backend: B,
    config: SelectConfig,
}

impl<B: KeyValueBackend> KeyValueAdapter<B> {
    /// Wrap a backend client.
    pub fn new(backend: B, config: SelectConfig) -> Self {
        Self { backend, config }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A builder carrying the configured default page size.
    #[must_use]
    pub fn select(&self) -> Select {
        Select::with_limit(self.config.default_limit)
    }

    /// Compile a builder into a `Query` or `Scan` plan.
    ///
    /// The table is described on every call so that the key split always
    /// reflects the live key schema.
    pub fn compile(&self, select: &Select) -> QueryResult<QueryPlan<KeyValueParams>> {
        let shape = select.build()?;
        self.compile_shape(&shape)
    }

    /// Fetch one page, using the configured error mode.
    pub fn fetch(&self, select: &Select, start_cursor: Option<PageCursor>) -> QueryResult<Page> {
        let mode = ErrorMode::from_strict(self.config.strict_errors);
        self.fetch_with(select, start_cursor, mode)
    }

    /// Fetch one page with an explicit error mode.
    pub fn fetch_with(
        &self,
        select: &Select,
        start_cursor: Option<PageCursor>,
        error_mode: ErrorMode,
    ) -> QueryResult<Page> {
        let shape = select.build()?;
        let plan = self.compile_shape(&shape)?;
        let engine = PaginationEngine::new(&self.backend, &self.config.pagination);
        engine.fetch_page(
            &plan,
            PageRequest {
                limit: shape.limit,
                skip: shape.skip,
                start_cursor,
                error_mode,
            },
        )
    }

    /// Fetch one page and flatten it to JSON documents.
    pub fn fetch_rows(&self, select: &Select) -> QueryResult<Rowset> {
        self.fetch(select, None).map(Rowset::from)
    }

    fn compile_shape(&self, shape: &QueryShape) -> QueryResult<QueryPlan<KeyValueParams>> {
        let table = shape.table()?;
        let description = self.backend.describe_table(table)?;
        let schema = SchemaInfo::from_table_description(&description)?;
        keyvalue::compile(shape, &schema, self.config.consistent_read)
    }
}

/// Runs queries against a search backend.
#[derive(Debug)]
pub struct SearchAdapter<B> {
    backend: B,
    config: SelectConfig,
}

impl<B: SearchBackend> SearchAdapter<B> {
    /// Wrap a backend client.
    pub fn new(backend: B, config: SelectConfig) -> Self {
        Self { backend, config }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A builder carrying the configured default page size.
    #[must_use]
    pub fn select(&self) -> Select {
        Select::with_limit(self.config.default_limit)
    }

    /// Compile a builder into a search request.
    pub fn compile(&self, select: &Select) -> QueryResult<QueryPlan<SearchRequest>> {
        search::compile(&select.build()?)
    }

    /// Run a builder. Paging is native: `skip` and `limit` become `from`
    /// and `size`.
    pub fn fetch(&self, select: &Select) -> QueryResult<Rowset> {
        let plan = self.compile(select)?;
        let response = self.backend.search(plan.native_params)?;
        debug!(
            hits = response.hits.len(),
            total = response.total,
            "search request completed"
        );
        Ok(Rowset {
            items: response.hits,
            total: response.total,
        })
    }
}
