//! Core types and traits for remreg
//!
//! This crate defines the foundational types used throughout the system:
//! - Key: one segment of the remote hierarchy, linked to its parent
//! - Value, ValueType, ValueData: typed values and their payload codec
//! - Handle, AccessMask, WellKnownRoot, SessionId: session-scoped resources
//! - RemoteRegistryTransport, TransportConnector: the RPC boundary
//! - UiNotifier: the presentation boundary
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connect;
pub mod error;
pub mod handle;
pub mod key;
pub mod notify;
pub mod transport;
pub mod value;

pub use connect::{ConnectParams, Credentials, TransportKind};
pub use error::{AuthError, DecodeError, Error, Result, StatusCode, TransportError};
pub use handle::{AccessMask, Handle, SessionId, WellKnownRoot};
pub use key::{Key, KeyRef, RootBinding, PATH_SEPARATOR};
pub use notify::{NullNotifier, UiNotifier};
pub use transport::{
    datetime_to_nttime, nttime_to_datetime, ChildEntry, CreateAction, RemoteRegistryTransport,
    TransportConnector, TransportResult, ValueEntry,
};
pub use value::{normalize_default_value, same_name, Value, ValueData, ValueType, DEFAULT_VALUE_NAME};
