//! Session Integration Tests
//!
//! End-to-end behavior of one session against the in-memory registry:
//! - paging: listings are independent of the server's page size
//! - handles: every non-root handle opened is closed, on every path
//! - mutations: keys and values written through the session
//! - connection: connect, reconnect and loss of the transport

#[path = "../common/mod.rs"]
mod common;

mod connection;
mod mutations;
mod paging;
