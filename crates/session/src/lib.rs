//! Session layer for remreg
//!
//! Owns the single transport of a connection and everything that talks to
//! it:
//! - TransportLock: the one mutex every remote call goes through
//! - HandlePathResolver: key → chain of open handles, leak-free on failure
//! - EnumerationPager: indexed enumeration until end-of-list
//! - SessionManager: list, create, remove, set/unset/move values
//! - Connection: Disconnected → Connecting → Connected state machine
//! - SessionConfig: `remreg.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod lock;
pub mod manager;
pub mod pager;
pub mod path;

pub use config::{SessionConfig, CONFIG_FILE_NAME};
pub use connection::{Connection, ConnectionState};
pub use lock::TransportLock;
pub use manager::{
    KeyListing, ListOptions, SessionManager, SessionOptions, DEFAULT_PROGRESS_ESTIMATE,
};
pub use pager::EnumerationPager;
pub use path::{HandlePath, HandlePathResolver};
