//! Error types for remreg
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Type | Raised by |
//! |------|-----------|
//! | [`TransportError`] | any failed remote call (carries the server status code) |
//! | [`AuthError`] | connect time only |
//! | [`DecodeError`] | interpreting a value payload under its declared type |
//! | [`Error`] | everything the session layer returns |

use std::fmt;
use std::io;
use thiserror::Error;

use crate::value::ValueType;

/// Result type alias for remreg operations
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Status codes
// ============================================================================

/// Status code returned by the remote registry service.
///
/// Codes follow the Windows error space used by the winreg RPC interface.
/// The transport decides which code ends an enumeration, see
/// `RemoteRegistryTransport::no_more_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Success
    pub const OK: StatusCode = StatusCode(0);
    /// The key or value does not exist (already deleted)
    pub const BADFILE: StatusCode = StatusCode(2);
    /// Caller lacks the rights for this key
    pub const ACCESS_DENIED: StatusCode = StatusCode(5);
    /// The named pipe broke underneath the session
    pub const PIPE_BROKEN: StatusCode = StatusCode(109);
    /// Malformed request
    pub const INVALID_PARAMETER: StatusCode = StatusCode(87);
    /// The supplied buffer was too small
    pub const MORE_DATA: StatusCode = StatusCode(234);
    /// Enumeration index is past the last item
    pub const NO_MORE_ITEMS: StatusCode = StatusCode(0x103);
    /// Bad credentials
    pub const LOGON_FAILURE: StatusCode = StatusCode(1326);
    /// The RPC server went away
    pub const SERVER_UNAVAILABLE: StatusCode = StatusCode(1722);

    /// Raw numeric value
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Symbolic name for well-known codes
    pub fn name(self) -> Option<&'static str> {
        match self {
            StatusCode::OK => Some("WERR_OK"),
            StatusCode::BADFILE => Some("WERR_BADFILE"),
            StatusCode::ACCESS_DENIED => Some("WERR_ACCESS_DENIED"),
            StatusCode::PIPE_BROKEN => Some("WERR_BROKEN_PIPE"),
            StatusCode::INVALID_PARAMETER => Some("WERR_INVALID_PARAMETER"),
            StatusCode::MORE_DATA => Some("WERR_MORE_DATA"),
            StatusCode::NO_MORE_ITEMS => Some("WERR_NO_MORE_ITEMS"),
            StatusCode::LOGON_FAILURE => Some("WERR_LOGON_FAILURE"),
            StatusCode::SERVER_UNAVAILABLE => Some("RPC_S_SERVER_UNAVAILABLE"),
            _ => None,
        }
    }

    /// Whether this code means the connection itself is gone
    pub fn is_connection_lost(self) -> bool {
        matches!(self, StatusCode::PIPE_BROKEN | StatusCode::SERVER_UNAVAILABLE)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

// ============================================================================
// Transport errors
// ============================================================================

/// Failure reported by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({status})")]
pub struct TransportError {
    /// Status code returned by the server or the RPC layer
    pub status: StatusCode,
    /// Human readable description
    pub message: String,
}

impl TransportError {
    /// Create a transport error with an explicit message
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error whose message is the status name
    pub fn from_status(status: StatusCode) -> Self {
        let message = status
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("status 0x{:08x}", status.0));
        Self { status, message }
    }

    /// Whether the server refused access to the key
    pub fn is_access_denied(&self) -> bool {
        self.status == StatusCode::ACCESS_DENIED
    }

    /// Whether the target key or value no longer exists
    pub fn is_bad_file(&self) -> bool {
        self.status == StatusCode::BADFILE
    }
}

// ============================================================================
// Authentication errors
// ============================================================================

/// Connect-time failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Wrong username or password
    #[error("Invalid username or password.")]
    LogonFailure,

    /// The server could not be reached at all
    #[error("The server could not be reached: {host}")]
    HostUnreachable {
        /// Address that was dialed
        host: String,
    },

    /// Anything else the RPC layer reported while binding
    #[error("{0}")]
    Other(String),
}

// ============================================================================
// Decode errors
// ============================================================================

/// A value payload cannot be interpreted under its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The type tag has no codec
    #[error("unsupported value type {0}")]
    UnsupportedType(ValueType),

    /// Fixed-width payload has the wrong size
    #[error("{kind} payload must be {expected} bytes, got {actual}")]
    Length {
        /// Declared type
        kind: ValueType,
        /// Required payload size
        expected: usize,
        /// Actual payload size
        actual: usize,
    },

    /// UTF-16 payload with an odd number of bytes
    #[error("{kind} payload has odd length {len}")]
    OddLength {
        /// Declared type
        kind: ValueType,
        /// Payload size
        len: usize,
    },

    /// UTF-16 payload with unpaired surrogates
    #[error("{kind} payload is not valid UTF-16")]
    InvalidUtf16 {
        /// Declared type
        kind: ValueType,
    },
}

// ============================================================================
// Session errors
// ============================================================================

/// Error returned by session and worker operations
#[derive(Debug, Error)]
pub enum Error {
    /// A remote call failed
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The key or value was already deleted on the server
    #[error("not found: {path}")]
    NotFound {
        /// Absolute path of the missing entry
        path: String,
    },

    /// Authentication or binding failed while connecting
    #[error("Failed to connect: {0}")]
    Auth(#[from] AuthError),

    /// The operation exists in the API but is not supported by this client
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Operation name
        operation: &'static str,
    },

    /// A value payload could not be decoded
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// The session was closed, either explicitly or by the transport
    #[error("not connected")]
    Disconnected,

    /// Another connect attempt is already running
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    /// The request makes no sense for the given key or value
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The key's root was opened by a different session
    #[error("key '{path}' belongs to a previous session")]
    StaleKey {
        /// Absolute path of the key
        path: String,
    },

    /// `move_value` deleted the old name but could not write the new one.
    /// The value no longer exists under either name.
    #[error("value '{old_name}' was deleted but '{new_name}' could not be written: {source}")]
    PartialMove {
        /// Name that was deleted
        old_name: String,
        /// Name that failed to be written
        new_name: String,
        /// Failure of the write
        #[source]
        source: TransportError,
    },

    /// Configuration could not be read or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O (config files, thread spawning)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Map a transport failure on `path`, turning "bad file" into [`Error::NotFound`]
    pub fn at_path(err: TransportError, path: impl Into<String>) -> Self {
        if err.is_bad_file() {
            Error::NotFound { path: path.into() }
        } else {
            Error::Transport(err)
        }
    }

    /// Status code of the underlying transport failure, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Transport(e) => Some(e.status),
            Error::PartialMove { source, .. } => Some(source.status),
            Error::NotFound { .. } => Some(StatusCode::BADFILE),
            _ => None,
        }
    }

    /// Whether the server refused access
    pub fn is_access_denied(&self) -> bool {
        self.status() == Some(StatusCode::ACCESS_DENIED)
    }

    /// Whether the connection is gone and the session must be dropped
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Disconnected)
            || self.status().map_or(false, StatusCode::is_connection_lost)
    }
}
