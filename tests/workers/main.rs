//! Worker Integration Tests
//!
//! Fetch and search workers running on their own threads against one
//! shared session, with results delivered through the event queue:
//! - fetch: listings, serialization of remote calls, superseded results
//! - search: traversal order, hits, misses and failures

#[path = "../common/mod.rs"]
mod common;

mod fetch;
