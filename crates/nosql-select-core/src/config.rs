//! Query layer configuration.

use std::env;
use std::time::Duration;

/// Limits of the continuation loop that drives cursor-paged backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Maximum number of backend calls per pagination pass. A request with a
    /// `skip` runs two passes, the skip pass and the page pass, so it may
    /// make up to twice this many calls.
    pub max_rounds: usize,
    /// Wall-clock budget when the caller started from the beginning.
    pub first_call_budget: Duration,
    /// Wall-clock budget when the caller resumed from a cursor.
    pub continuation_budget: Duration,
    /// Pause inserted before every `backoff_every`-th call.
    pub backoff: Duration,
    /// Call interval at which the backoff pause applies. Zero disables it.
    pub backoff_every: usize,
    /// Page size requested when the caller asked for everything.
    /// `None` lets the backend pick its natural page.
    pub page_size: Option<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 6,
            first_call_budget: Duration::from_secs(20),
            continuation_budget: Duration::from_secs(25),
            backoff: Duration::from_millis(200),
            backoff_every: 2,
            page_size: None,
        }
    }
}

/// Query layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectConfig {
    /// Page size applied by a fresh [`Select`](crate::select::Select).
    pub default_limit: usize,
    /// Request strongly consistent reads from the key-value backend.
    pub consistent_read: bool,
    /// Propagate backend errors during pagination instead of returning the
    /// partial result gathered so far.
    pub strict_errors: bool,
    /// Continuation loop limits.
    pub pagination: PaginationConfig,
}

impl SelectConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = PaginationConfig::default();
        Self {
            default_limit: env_usize("NOSQL_SELECT_DEFAULT_LIMIT", 20),
            consistent_read: env_bool("NOSQL_SELECT_CONSISTENT_READ", false),
            strict_errors: env_bool("NOSQL_SELECT_STRICT_ERRORS", false),
            pagination: PaginationConfig {
                max_rounds: env_usize("NOSQL_SELECT_MAX_ROUNDS", defaults.max_rounds),
                first_call_budget: env_millis(
                    "NOSQL_SELECT_FIRST_CALL_BUDGET_MS",
                    defaults.first_call_budget,
                ),
                continuation_budget: env_millis(
                    "NOSQL_SELECT_CONTINUATION_BUDGET_MS",
                    defaults.continuation_budget,
                ),
                backoff: env_millis("NOSQL_SELECT_BACKOFF_MS", defaults.backoff),
                backoff_every: env_usize("NOSQL_SELECT_BACKOFF_EVERY", defaults.backoff_every),
                page_size: env::var("NOSQL_SELECT_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n: &usize| *n > 0),
            },
        }
    }
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            consistent_read: false,
            strict_errors: false,
            pagination: PaginationConfig::default(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map_or(default, Duration::from_millis)
}
