//! Whole-tree text search
//!
//! Depth-first over an explicit stack, starting from the session's roots.
//! The roots are snapshotted under the lock; after that every step is an
//! ordinary `list_key`, so a search interleaves with fetches and mutations
//! on the same session.
//!
//! ## Visit order
//!
//! Children are pushed in reverse listing order so the first-listed child is
//! popped first. For a tree `{A: [A1, A2], B: []}` the order is A, A1, A2, B.
//!
//! ## Per key
//!
//! 1. Key name, if enabled.
//! 2. `list_key` without progress. A failure skips this subtree.
//! 3. Value names in listing order, if enabled.
//! 4. Value data in listing order, if enabled. A value that cannot be
//!    decoded is logged and skipped.
//! 5. Push the children.
//!
//! The first match ends the search.

use std::sync::Arc;

use remreg_core::{Error, KeyRef, Result, UiNotifier, Value};
use remreg_session::SessionManager;
use tracing::{debug, info, warn};

use crate::handle::{failure_message, spawn_worker, WorkerHandle};

/// What to look for and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Text to find
    pub text: String,
    /// Test key names
    pub keys: bool,
    /// Test value names
    pub values: bool,
    /// Test value data
    pub data: bool,
    /// Compare the whole text against the whole name or data instead of
    /// looking for any whitespace-separated term as a substring
    pub whole_string: bool,
}

impl SearchQuery {
    /// Substring search of key names, value names and data
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keys: true,
            values: true,
            data: true,
            whole_string: false,
        }
    }

    /// Choose which fields are tested
    pub fn fields(mut self, keys: bool, values: bool, data: bool) -> Self {
        self.keys = keys;
        self.values = values;
        self.data = data;
        self
    }

    /// Require the field to equal the whole text exactly.
    ///
    /// This is stricter than an unsplit substring search: `"foo bar"` does
    /// not match `"foo bar baz"`.
    pub fn whole_string(mut self, whole: bool) -> Self {
        self.whole_string = whole;
        self
    }

    fn terms(&self) -> Vec<&str> {
        if self.whole_string {
            vec![self.text.as_str()]
        } else {
            self.text.split_whitespace().collect()
        }
    }

    /// Whether `haystack` matches this query. Case-sensitive. In whole-string
    /// mode the haystack must equal the text, not merely contain it.
    pub fn matches(&self, haystack: &str) -> bool {
        if self.whole_string {
            haystack == self.text
        } else {
            self.terms().iter().any(|term| haystack.contains(term))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.terms().iter().all(|t| t.is_empty()) {
            return Err(Error::InvalidOperation("empty search query".to_string()));
        }
        if !(self.keys || self.values || self.data) {
            return Err(Error::InvalidOperation(
                "search needs at least one of keys, values or data".to_string(),
            ));
        }
        Ok(())
    }

    /// Status text for a search that found nothing
    pub fn miss_message(&self) -> String {
        let mut msg = "Search query not found.".to_string();
        if self.whole_string {
            msg.push_str("\n\nConsider searching again with 'Match whole string' unchecked");
        }
        msg
    }
}

/// Where a match was found
#[derive(Debug, Clone)]
pub enum SearchHit {
    /// The key's own name matched
    Key(KeyRef),
    /// A value's name matched
    ValueName(Value),
    /// A value's data matched
    ValueData(Value),
}

impl SearchHit {
    /// Key to highlight
    pub fn key(&self) -> &KeyRef {
        match self {
            SearchHit::Key(key) => key,
            SearchHit::ValueName(value) | SearchHit::ValueData(value) => value.parent(),
        }
    }

    /// Value to highlight, for value hits
    pub fn value(&self) -> Option<&Value> {
        match self {
            SearchHit::Key(_) => None,
            SearchHit::ValueName(value) | SearchHit::ValueData(value) => Some(value),
        }
    }

    /// "Found key at: PATH" and friends
    pub fn status_message(&self) -> String {
        match self {
            SearchHit::Key(key) => format!("Found key at: {}", key.absolute_path()),
            SearchHit::ValueName(value) => format!("Found value at: {}", value.absolute_path()),
            SearchHit::ValueData(value) => format!("Found data at: {}", value.absolute_path()),
        }
    }
}

/// Result of a completed search
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// First match in visit order
    Found(SearchHit),
    /// Every reachable key was visited
    NotFound,
}

/// Synchronous depth-first search over one session
pub struct Searcher<'a> {
    session: &'a SessionManager,
    query: &'a SearchQuery,
    start: Option<Vec<KeyRef>>,
    on_visit: Option<Box<dyn FnMut(&KeyRef) + 'a>>,
}

impl<'a> Searcher<'a> {
    /// Search from the session's well-known roots
    pub fn new(session: &'a SessionManager, query: &'a SearchQuery) -> Self {
        Self {
            session,
            query,
            start: None,
            on_visit: None,
        }
    }

    /// Search from `keys` instead of the roots, in the given order
    pub fn starting_at(mut self, keys: Vec<KeyRef>) -> Self {
        self.start = Some(keys);
        self
    }

    /// Observe every visited key, in visit order
    pub fn on_visit(mut self, f: impl FnMut(&KeyRef) + 'a) -> Self {
        self.on_visit = Some(Box::new(f));
        self
    }

    /// Run to the first match or exhaustion.
    ///
    /// Fails only for an invalid query or when the session itself is lost;
    /// per-key failures skip that subtree.
    pub fn run(mut self) -> Result<SearchOutcome> {
        self.query.validate()?;
        let start = match self.start.take() {
            Some(keys) => keys,
            None => self.session.well_known_keys()?,
        };
        let mut stack: Vec<KeyRef> = start.into_iter().rev().collect();
        let mut visited = 0usize;

        while let Some(key) = stack.pop() {
            visited += 1;
            if let Some(f) = self.on_visit.as_mut() {
                f(&key);
            }

            if self.query.keys && self.query.matches(&key.name()) {
                return Ok(self.found(SearchHit::Key(key), visited));
            }

            let listing = match self.session.list_key(&key) {
                Ok(listing) => listing,
                Err(e) if e.is_connection_lost() => return Err(e),
                Err(e) => {
                    warn!(target: "remreg::worker", path = %key.absolute_path(), error = %e, "Skipping subtree");
                    continue;
                }
            };

            if self.query.values {
                if let Some(value) = listing.values.iter().find(|v| self.query.matches(v.name())) {
                    return Ok(self.found(SearchHit::ValueName(value.clone()), visited));
                }
            }

            if self.query.data {
                for value in &listing.values {
                    match value.data_string() {
                        Ok(text) if self.query.matches(&text) => {
                            return Ok(self.found(SearchHit::ValueData(value.clone()), visited));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(target: "remreg::worker", path = %value.absolute_path(), error = %e, "Undecodable value skipped");
                        }
                    }
                }
            }

            stack.extend(listing.children.into_iter().rev());
        }

        info!(target: "remreg::worker", visited, text = %self.query.text, "Search found nothing");
        Ok(SearchOutcome::NotFound)
    }

    fn found(&self, hit: SearchHit, visited: usize) -> SearchOutcome {
        info!(target: "remreg::worker", visited, hit = %hit.status_message(), "Search matched");
        SearchOutcome::Found(hit)
    }
}

/// Run a search and report its outcome to `notifier`
pub fn search(session: &SessionManager, query: &SearchQuery, notifier: &dyn UiNotifier) -> Result<SearchOutcome> {
    let outcome = Searcher::new(session, query).run()?;
    match &outcome {
        SearchOutcome::Found(hit) => {
            notifier.report_search_hit(hit.key(), hit.value());
            notifier.report_status(&hit.status_message());
        }
        SearchOutcome::NotFound => {
            notifier.report_search_miss();
            notifier.report_status(&query.miss_message());
        }
    }
    Ok(outcome)
}

/// Background whole-tree search
pub struct SearchWorker;

impl SearchWorker {
    /// Start a search on a new thread. Errors are logged and reported to
    /// `notifier`.
    pub fn spawn(
        session: Arc<SessionManager>,
        query: SearchQuery,
        notifier: Arc<dyn UiNotifier>,
    ) -> Result<WorkerHandle<Option<SearchOutcome>>> {
        spawn_worker("search", notifier, move |notifier| {
            debug!(target: "remreg::worker", text = %query.text, "Search started");
            match search(&session, &query, notifier) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(target: "remreg::worker", error = %e, "Search failed");
                    let message = failure_message(&e);
                    notifier.report_status(&message);
                    notifier.report_error(&message);
                    None
                }
            }
        })
    }
}
