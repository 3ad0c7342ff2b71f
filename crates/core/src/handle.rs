//! Handles, access rights and the well-known roots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use uuid::Uuid;

/// Opaque reference to an open key, issued by the transport.
///
/// A handle is only meaningful inside the session that opened it and must be
/// closed explicitly; dropping a `Handle` does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Wrap a transport-specific handle value
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    /// Transport-specific handle value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{:#x}", self.0)
    }
}

/// Desired access rights passed when opening or creating keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMask(u32);

impl AccessMask {
    /// Read values
    pub const KEY_QUERY_VALUE: AccessMask = AccessMask(0x0001);
    /// Write values
    pub const KEY_SET_VALUE: AccessMask = AccessMask(0x0002);
    /// Create subkeys
    pub const KEY_CREATE_SUB_KEY: AccessMask = AccessMask(0x0004);
    /// List subkeys
    pub const KEY_ENUMERATE_SUB_KEYS: AccessMask = AccessMask(0x0008);

    /// Rights needed to browse and edit: enumerate, create, query and set.
    pub const EDIT: AccessMask = AccessMask(0x000f);

    /// Build from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        AccessMask(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every right in `other` is granted by `self`
    pub const fn contains(self, other: AccessMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for AccessMask {
    fn default() -> Self {
        AccessMask::EDIT
    }
}

impl BitOr for AccessMask {
    type Output = AccessMask;

    fn bitor(self, rhs: AccessMask) -> AccessMask {
        AccessMask(self.0 | rhs.0)
    }
}

/// The five top-level entry points into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownRoot {
    /// HKEY_CLASSES_ROOT
    ClassesRoot,
    /// HKEY_CURRENT_USER
    CurrentUser,
    /// HKEY_LOCAL_MACHINE
    LocalMachine,
    /// HKEY_USERS
    Users,
    /// HKEY_CURRENT_CONFIG
    CurrentConfig,
}

impl WellKnownRoot {
    /// All roots in the order they are opened and displayed
    pub const ALL: [WellKnownRoot; 5] = [
        WellKnownRoot::ClassesRoot,
        WellKnownRoot::CurrentUser,
        WellKnownRoot::LocalMachine,
        WellKnownRoot::Users,
        WellKnownRoot::CurrentConfig,
    ];

    /// Display name, which is also the first path segment
    pub const fn name(self) -> &'static str {
        match self {
            WellKnownRoot::ClassesRoot => "HKEY_CLASSES_ROOT",
            WellKnownRoot::CurrentUser => "HKEY_CURRENT_USER",
            WellKnownRoot::LocalMachine => "HKEY_LOCAL_MACHINE",
            WellKnownRoot::Users => "HKEY_USERS",
            WellKnownRoot::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Look a root up by its full name or the usual abbreviation (`HKLM`)
    pub fn from_name(name: &str) -> Option<Self> {
        WellKnownRoot::ALL.into_iter().find(|root| {
            root.name().eq_ignore_ascii_case(name) || root.abbreviation().eq_ignore_ascii_case(name)
        })
    }

    /// Short form, e.g. `HKLM`
    pub const fn abbreviation(self) -> &'static str {
        match self {
            WellKnownRoot::ClassesRoot => "HKCR",
            WellKnownRoot::CurrentUser => "HKCU",
            WellKnownRoot::LocalMachine => "HKLM",
            WellKnownRoot::Users => "HKU",
            WellKnownRoot::CurrentConfig => "HKCC",
        }
    }
}

impl fmt::Display for WellKnownRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one connection, used to reject keys from an earlier session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random id
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
