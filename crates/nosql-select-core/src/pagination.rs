//! Continuation loop for cursor-paged key-value reads.
//!
//! The key-value backend caps every response, so a single caller page may
//! need several backend calls. [`PaginationEngine::fetch_page`] keeps calling
//! until the requested count is reached, the data is exhausted, the round
//! ceiling is hit, or the wall-clock budget runs out. Running out of time is
//! never an error: the caller gets what was gathered and no cursor.
//!
//! The store has no native offset, so `skip` is emulated with a first pass
//! that only advances the cursor. Each pass gets its own round ceiling.
//!
//! A backend may return more items than the round asked for. When the page
//! is cut down to the caller's limit while the read is still live, the next
//! cursor is rebuilt from the key of the last item kept, so the dropped items
//! open the following page.

use std::thread;
use std::time::{Duration, Instant};

use nosql_select_model::{BackendError, Item, QueryOutput};
use tracing::{debug, warn};

use crate::backend::{KeyValueBackend, PageCursor};
use crate::compiler::{KeyValueParams, QueryMethod, QueryPlan};
use crate::config::PaginationConfig;
use crate::error::QueryResult;

/// What to do when a backend call fails mid-pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Surface the error to the caller.
    Strict,
    /// Stop paginating and return what was gathered so far.
    #[default]
    Lenient,
}

impl ErrorMode {
    /// Pick a mode from a `strict_errors` flag.
    #[must_use]
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }
}

/// One caller page request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Number of items wanted. Zero means all.
    pub limit: usize,
    /// Number of leading matches to pass over.
    pub skip: usize,
    /// Cursor returned by a previous page.
    pub start_cursor: Option<PageCursor>,
    /// Backend error handling.
    pub error_mode: ErrorMode,
}

/// Result of [`PaginationEngine::fetch_page`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Matched items, at most `limit` of them.
    pub items: Vec<Item>,
    /// Number of items in `items`.
    pub total_returned: usize,
    /// Where the next page starts. `None` when the data is exhausted or the
    /// read was cut short by the time budget.
    pub next_cursor: Option<PageCursor>,
    /// Items the backend examined, summed over every call.
    pub scanned_count: usize,
    /// Backend calls made.
    pub rounds: usize,
}

/// Why a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Exhausted,
    Filled,
    Ceiling,
    Budget,
    Failed,
}

#[derive(Debug)]
struct Pass {
    items: Vec<Item>,
    cursor: Option<PageCursor>,
    stop: Stop,
    rounds: usize,
    scanned: usize,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    started: Instant,
    budget: Duration,
}

impl Clock {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn exceeded(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

/// Drives a compiled key-value plan page by page.
#[derive(Debug)]
pub struct PaginationEngine<'a, B> {
    backend: &'a B,
    config: &'a PaginationConfig,
}

impl<'a, B: KeyValueBackend> PaginationEngine<'a, B> {
    /// Create an engine over a backend.
    pub fn new(backend: &'a B, config: &'a PaginationConfig) -> Self {
        Self { backend, config }
    }

    /// Fetch one caller page.
    pub fn fetch_page(
        &self,
        plan: &QueryPlan<KeyValueParams>,
        request: PageRequest,
    ) -> QueryResult<Page> {
        if plan.method == QueryMethod::Search {
            return Err(BackendError::validation(
                "search plans are paged by the search engine itself",
            )
            .into());
        }

        let budget = if request.start_cursor.is_some() {
            self.config.continuation_budget
        } else {
            self.config.first_call_budget
        };
        let clock = Clock::start(budget);
        let mode = request.error_mode;
        let key_fields = &plan.native_params.key_fields;
        let mut page = Page::default();
        let mut carried = Vec::new();
        let mut start = request.start_cursor;

        if request.skip > 0 {
            let pass = self.run_pass(plan, request.skip, start, &clock, mode)?;
            page.rounds += pass.rounds;
            page.scanned_count += pass.scanned;
            let mut skipped = pass.items;

            if skipped.len() < request.skip {
                if pass.stop != Stop::Exhausted {
                    warn!(
                        skip = request.skip,
                        reached = skipped.len(),
                        stop = ?pass.stop,
                        "skip offset not reached, returning an empty page"
                    );
                }
                return Ok(page);
            }

            carried = skipped.split_off(request.skip);
            let filled = request.limit > 0 && carried.len() >= request.limit;
            if pass.cursor.is_none() || filled {
                return Ok(finish(page, carried, request.limit, pass.cursor, key_fields));
            }
            if clock.exceeded() {
                warn!(budget = ?clock.budget, "time budget spent on skip pass");
                return Ok(finish(page, carried, request.limit, None, key_fields));
            }
            start = pass.cursor;
        }

        let target = if request.limit == 0 {
            0
        } else {
            request.limit - carried.len()
        };
        let pass = self.run_pass(plan, target, start, &clock, mode)?;
        page.rounds += pass.rounds;
        page.scanned_count += pass.scanned;
        carried.extend(pass.items);
        Ok(finish(page, carried, request.limit, pass.cursor, key_fields))
    }

    /// Call the backend until `target` items are gathered (zero means all).
    fn run_pass(
        &self,
        plan: &QueryPlan<KeyValueParams>,
        target: usize,
        start: Option<PageCursor>,
        clock: &Clock,
        mode: ErrorMode,
    ) -> QueryResult<Pass> {
        let mut pass = Pass {
            items: Vec::new(),
            cursor: start,
            stop: Stop::Exhausted,
            rounds: 0,
            scanned: 0,
        };

        loop {
            if pass.rounds > 0 && clock.exceeded() {
                warn!(
                    rounds = pass.rounds,
                    gathered = pass.items.len(),
                    budget = ?clock.budget,
                    "time budget exceeded, returning partial page"
                );
                pass.cursor = None;
                pass.stop = Stop::Budget;
                return Ok(pass);
            }
            if pass.rounds >= self.config.max_rounds {
                warn!(
                    rounds = pass.rounds,
                    gathered = pass.items.len(),
                    "round ceiling reached, returning partial page"
                );
                pass.stop = Stop::Ceiling;
                return Ok(pass);
            }

            self.pause_before(pass.rounds + 1);
            let limit = if target == 0 {
                self.config.page_size
            } else {
                Some(target - pass.items.len())
            }
            .map(|n| i32::try_from(n).unwrap_or(i32::MAX));

            pass.rounds += 1;
            match self.call(plan, limit, pass.cursor.clone()) {
                Ok(output) => {
                    pass.scanned += usize::try_from(output.scanned_count).unwrap_or(0);
                    pass.items.extend(output.items);
                    pass.cursor = PageCursor::from_last_key(output.last_evaluated_key);
                    debug!(
                        round = pass.rounds,
                        gathered = pass.items.len(),
                        has_cursor = pass.cursor.is_some(),
                        "pagination round"
                    );
                }
                Err(err) => match mode {
                    ErrorMode::Strict => return Err(err.into()),
                    ErrorMode::Lenient => {
                        warn!(
                            round = pass.rounds,
                            gathered = pass.items.len(),
                            error = %err,
                            "backend call failed, returning partial page"
                        );
                        pass.stop = Stop::Failed;
                        return Ok(pass);
                    }
                },
            }

            if pass.cursor.is_none() {
                pass.stop = Stop::Exhausted;
                return Ok(pass);
            }
            if target > 0 && pass.items.len() >= target {
                pass.stop = Stop::Filled;
                return Ok(pass);
            }
        }
    }

    fn pause_before(&self, call: usize) {
        let every = self.config.backoff_every;
        if every > 0 && call % every == 0 && !self.config.backoff.is_zero() {
            thread::sleep(self.config.backoff);
        }
    }

    fn call(
        &self,
        plan: &QueryPlan<KeyValueParams>,
        limit: Option<i32>,
        start: Option<PageCursor>,
    ) -> Result<QueryOutput, BackendError> {
        let params = &plan.native_params;
        match plan.method {
            QueryMethod::IndexedQuery => self.backend.query(params.to_query_input(limit, start)),
            QueryMethod::FullScan => self
                .backend
                .scan(params.to_scan_input(limit, start))
                .map(QueryOutput::from),
            QueryMethod::Search => Err(BackendError::validation(
                "search plans cannot run against a key-value backend",
            )),
        }
    }
}

fn finish(
    mut page: Page,
    mut items: Vec<Item>,
    limit: usize,
    mut cursor: Option<PageCursor>,
    key_fields: &[String],
) -> Page {
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
        cursor = cursor.map(|past| resume_point(&items, past, key_fields));
    }
    page.total_returned = items.len();
    page.items = items;
    page.next_cursor = cursor;
    page
}

/// Cursor just after the last kept item. Falls back to the attribute names
/// of the backend's own cursor when the plan carries no key fields.
fn resume_point(kept: &[Item], past: PageCursor, key_fields: &[String]) -> PageCursor {
    let fields: Vec<String> = if key_fields.is_empty() {
        past.as_key().keys().cloned().collect()
    } else {
        key_fields.to_vec()
    };
    match kept.last().and_then(|item| PageCursor::after_item(item, &fields)) {
        Some(cursor) => cursor,
        None => {
            warn!(
                ?fields,
                "last kept item lacks key attributes, resuming after the backend cursor"
            );
            past
        }
    }
}
