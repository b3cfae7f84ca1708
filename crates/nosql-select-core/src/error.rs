//! Error taxonomy for query building, compilation and execution.

use nosql_select_model::BackendError;

/// Errors surfaced to the caller of the query layer.
///
/// Everything except [`QueryError::Backend`] is a mistake in the caller's
/// query and is never retried.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The condition text is malformed.
    #[error("Syntax error: {message}")]
    Syntax {
        /// Explanation.
        message: String,
    },
    /// The condition is well formed but cannot be expressed natively.
    #[error("Unsupported condition '{condition}': {reason}")]
    UnsupportedCondition {
        /// The offending predicate as written.
        condition: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A placeholder refers to a parameter that was never bound.
    #[error("Unbound parameter: {name}")]
    UnboundParameter {
        /// The placeholder name.
        name: String,
    },
    /// An index was selected but no predicate targets its partition key.
    #[error("No key condition targets index '{index}'")]
    MissingIndexKeyCondition {
        /// The selected index.
        index: String,
    },
    /// Ordering was requested on something other than a sort key.
    #[error("Unsupported order: {message}")]
    UnsupportedOrder {
        /// Explanation.
        message: String,
    },
    /// The selected index does not exist on the table.
    #[error("Unknown index: {index}")]
    UnknownIndex {
        /// The selected index.
        index: String,
    },
    /// The query names no table or search index to read from.
    #[error("No table or index selected")]
    MissingSource,
    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl QueryError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(condition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedCondition {
            condition: condition.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type QueryResult<T> = Result<T, QueryError>;
