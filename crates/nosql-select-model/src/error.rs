//! Backend error types.
//!
//! Backends report failures through a single error struct carrying a coarse
//! code, a message and an optional underlying cause. The query layer only
//! needs to tell throttling apart from everything else.

use std::fmt;

/// Coarse classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum BackendErrorCode {
    /// Table, index or search index not found.
    ResourceNotFound,
    /// Request rate exceeded.
    Throttled,
    /// The backend rejected the request as malformed.
    #[default]
    Validation,
    /// Connection or transport failure.
    Transport,
    /// Any other backend-side failure.
    Internal,
}

impl BackendErrorCode {
    /// Code name as rendered in messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFound => "ResourceNotFound",
            Self::Throttled => "Throttled",
            Self::Validation => "Validation",
            Self::Transport => "Transport",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a key-value or search backend.
#[derive(Debug)]
pub struct BackendError {
    /// Classification.
    pub code: BackendErrorCode,
    /// Backend message, passed through untouched.
    pub message: String,
    /// Transport or client error that caused this one.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl BackendError {
    /// An error of the given class.
    #[must_use]
    pub fn with_message(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the backend asked the caller to slow down.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        self.code == BackendErrorCode::Throttled
    }

    /// Missing table, index or search index.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(BackendErrorCode::ResourceNotFound, message)
    }

    /// Request throttled.
    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::with_message(BackendErrorCode::Throttled, message)
    }

    /// Request rejected as malformed.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(BackendErrorCode::Validation, message)
    }

    /// Transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(BackendErrorCode::Transport, message)
    }
}
