//! The remote registry transport boundary
//!
//! Everything that crosses the wire goes through [`RemoteRegistryTransport`].
//! Implementations are not expected to be thread-safe beyond `Send`: the
//! session owns the transport behind a single lock and only ever calls it
//! with exclusive access.

use chrono::{DateTime, TimeZone, Utc};

use crate::connect::ConnectParams;
use crate::error::{StatusCode, TransportError};
use crate::handle::{AccessMask, Handle, WellKnownRoot};
use crate::value::ValueType;
use crate::Result;

/// Result of a single remote call
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One subkey returned by an indexed enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Subkey name
    pub name: String,
    /// Class string (usually empty)
    pub class: String,
    /// Last write time, when the server reports one
    pub last_write: Option<DateTime<Utc>>,
}

/// One value returned by an indexed enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    /// Value name; empty for the key's default value
    pub name: String,
    /// Type tag
    pub kind: ValueType,
    /// Raw payload
    pub data: Vec<u8>,
    /// Payload length reported by the server
    pub length: u32,
}

/// What `create_child` did on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateAction {
    /// A new key was created
    CreatedNew,
    /// The key already existed and was opened
    OpenedExisting,
}

/// Remote calls the session layer needs from an RPC stub.
///
/// Every call may block on network I/O and may fail with a transport-defined
/// status code. The indexed enumeration calls signal the end of the list with
/// the code returned by [`no_more_items`](Self::no_more_items).
pub trait RemoteRegistryTransport: Send {
    /// Open one of the well-known roots
    fn open_root(&mut self, root: WellKnownRoot, access: AccessMask) -> TransportResult<Handle>;

    /// Open `name` under an already open key
    fn open_child(&mut self, parent: Handle, name: &str, access: AccessMask) -> TransportResult<Handle>;

    /// Release a handle
    fn close_handle(&mut self, handle: Handle) -> TransportResult<()>;

    /// Subkey at `index`, or the end-of-list status
    fn enumerate_child(&mut self, handle: Handle, index: u32) -> TransportResult<ChildEntry>;

    /// Value at `index`, or the end-of-list status
    fn enumerate_value(&mut self, handle: Handle, index: u32) -> TransportResult<ValueEntry>;

    /// Create (or open, if present) `name` under `parent`
    fn create_child(
        &mut self,
        parent: Handle,
        name: &str,
        access: AccessMask,
    ) -> TransportResult<(Handle, CreateAction)>;

    /// Delete the subkey `name` of `parent`. The subkey must have no children.
    fn delete_child(&mut self, parent: Handle, name: &str) -> TransportResult<()>;

    /// Write a value; the empty name addresses the default value
    fn set_value(&mut self, handle: Handle, name: &str, kind: ValueType, data: &[u8]) -> TransportResult<()>;

    /// Delete a value; the empty name addresses the default value
    fn delete_value(&mut self, handle: Handle, name: &str) -> TransportResult<()>;

    /// Status code that terminates an indexed enumeration.
    ///
    /// Defaults to `WERR_NO_MORE_ITEMS` (0x103) as defined by the winreg
    /// interface; a stub for a different protocol revision overrides it.
    fn no_more_items(&self) -> StatusCode {
        StatusCode::NO_MORE_ITEMS
    }

    /// Tear down the underlying connection
    fn shutdown(&mut self) -> TransportResult<()> {
        Ok(())
    }
}

/// Opens authenticated transports.
pub trait TransportConnector: Send + Sync {
    /// Bind and authenticate.
    ///
    /// Returns [`Error::Auth`](crate::Error::Auth) for bad credentials or an
    /// unreachable host.
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteRegistryTransport>>;
}

/// Seconds between 1601-01-01 (NTTIME epoch) and 1970-01-01
const NTTIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Convert an NTTIME (100ns ticks since 1601) to UTC.
///
/// Zero means "never" and maps to `None`.
pub fn nttime_to_datetime(nttime: u64) -> Option<DateTime<Utc>> {
    if nttime == 0 {
        return None;
    }
    let secs = (nttime / 10_000_000) as i64 - NTTIME_UNIX_OFFSET_SECS;
    let nanos = ((nttime % 10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Convert UTC to NTTIME
pub fn datetime_to_nttime(time: DateTime<Utc>) -> u64 {
    let secs = (time.timestamp() + NTTIME_UNIX_OFFSET_SECS).max(0) as u64;
    secs * 10_000_000 + u64::from(time.timestamp_subsec_nanos()) / 100
}
