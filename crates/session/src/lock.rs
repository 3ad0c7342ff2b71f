//! The single lock around the shared transport
//!
//! The transport lives *inside* the mutex, so there is no way to issue a
//! remote call without holding the lock. Callers hold it for one logical
//! step (a path open, one enumeration index, a delete) and never while
//! talking to the UI.

use parking_lot::Mutex;
use remreg_core::{Error, RemoteRegistryTransport, Result};
use tracing::warn;

/// Mutex-guarded transport slot. Empty once the session is closed.
pub struct TransportLock {
    inner: Mutex<Option<Box<dyn RemoteRegistryTransport>>>,
}

impl TransportLock {
    /// Take ownership of a connected transport
    pub fn new(transport: Box<dyn RemoteRegistryTransport>) -> Self {
        Self {
            inner: Mutex::new(Some(transport)),
        }
    }

    /// Run `f` with exclusive access to the transport.
    ///
    /// Returns [`Error::Disconnected`] if the transport is gone. If `f`
    /// reports that the connection itself was lost, the transport is dropped
    /// and every later call fails with `Disconnected`.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn RemoteRegistryTransport) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let transport = guard.as_deref_mut().ok_or(Error::Disconnected)?;
        let result = f(transport);
        if let Err(e) = &result {
            if e.is_connection_lost() && !matches!(e, Error::Disconnected) {
                warn!(target: "remreg::session", error = %e, "Transport signalled closure, dropping connection");
                *guard = None;
            }
        }
        result
    }

    /// Remove the transport, leaving the slot closed
    pub fn take(&self) -> Option<Box<dyn RemoteRegistryTransport>> {
        self.inner.lock().take()
    }

    /// Whether a transport is still present
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }
}
