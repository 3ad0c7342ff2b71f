//! remreg - session and handle management for remote registry clients
//!
//! remreg sits between a registry editor's UI and a remote registry RPC
//! stub. It owns the connection, opens and releases server-side handles in
//! balanced pairs, pages through enumerations, and runs fetches and
//! searches on background threads that talk back to the UI over a channel.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use remreg::{Connection, MemoryConnector, MemoryRegistry, SessionConfig, WellKnownRoot};
//!
//! let registry = MemoryRegistry::new();
//! registry.insert_key(WellKnownRoot::LocalMachine, "Software\\Vendor");
//!
//! let config = SessionConfig::default();
//! let connector = MemoryConnector::new(registry, "localhost").with_account("CORP\\alice", "pw");
//! let connection = Connection::new(Arc::new(connector), config.session_options());
//!
//! let session = connection.connect(&config.connect_params("pw")?)?;
//! let listing = session.list_key(&session.root(WellKnownRoot::LocalMachine)?)?;
//! ```
//!
//! # Architecture
//!
//! - [`remreg_core`]: keys, values, handles, errors and the transport and
//!   notifier traits
//! - [`remreg_session`]: the session manager, handle path resolution,
//!   paging and the connection state machine
//! - [`remreg_worker`]: fetch and search workers with event delivery
//! - [`remreg_memory`]: in-process registry server used for tests and
//!   offline work

pub use remreg_core::*;
pub use remreg_memory::{Fault, MemoryConnector, MemoryRegistry, MemoryStats, MemoryTransport, Op};
pub use remreg_session::{
    Connection, ConnectionState, EnumerationPager, HandlePath, HandlePathResolver, KeyListing,
    ListOptions, SessionConfig, SessionManager, SessionOptions, TransportLock, CONFIG_FILE_NAME,
    DEFAULT_PROGRESS_ESTIMATE,
};
pub use remreg_worker::{
    failure_message, fetch_key, search, ChannelNotifier, Envelope, EventQueue, FetchWorker,
    Origin, RequestId, SearchHit, SearchOutcome, SearchQuery, SearchWorker, Searcher, UiEvent,
    WorkerHandle,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global `fmt` subscriber for the `remreg::*` log targets.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used, e.g.
/// `"remreg=debug"`. Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", default_filter, e)))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Config(format!("tracing already initialized: {}", e)))
}
