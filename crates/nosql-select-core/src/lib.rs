//! Backend-agnostic query layer for key-value and search NoSQL engines.
//!
//! A caller describes a query with [`select::Select`]: a SQL-like condition
//! language, projection, ordering and a page window. The condition text is
//! parsed into a [`expression::ConditionTree`], lowered by one of the two
//! compilers into the backend's native request, and executed through an
//! adapter. Key-value requests are driven by the [`pagination`] engine.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod adapter;
pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expression;
pub mod pagination;
pub mod schema;
pub mod select;

pub use adapter::{KeyValueAdapter, Rowset, SearchAdapter};
pub use config::{PaginationConfig, SelectConfig};
pub use error::{QueryError, QueryResult};
pub use select::Select;
