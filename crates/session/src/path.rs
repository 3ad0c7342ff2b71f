//! Key path to handle chain resolution
//!
//! A remote key can only be opened relative to an already open parent, so
//! reaching `HKLM\A\B\C` means opening `A` under the persistent `HKLM`
//! handle, `B` under `A`, and `C` under `B`. The resulting chain is a
//! [`HandlePath`]; releasing it closes `C`, `B`, `A` in that order and never
//! touches the root handle.
//!
//! ## Leak freedom
//!
//! If opening segment *k* fails, segments 1..k-1 are closed before the error
//! is returned. [`HandlePathResolver::release`] keeps closing after an
//! individual close fails and reports the first failure.

use remreg_core::{
    AccessMask, Error, Handle, Key, KeyRef, RemoteRegistryTransport, Result, SessionId, TransportError,
};
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Open handles from a root down to one key, root first
#[derive(Debug)]
pub struct HandlePath {
    handles: SmallVec<[Handle; 8]>,
}

impl HandlePath {
    fn from_root(root: Handle) -> Self {
        let mut handles = SmallVec::new();
        handles.push(root);
        Self { handles }
    }

    /// Append a handle opened under the current leaf
    pub fn push(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    /// Persistent root handle
    pub fn root(&self) -> Handle {
        self.handles[0]
    }

    /// Handle of the deepest key
    pub fn leaf(&self) -> Handle {
        self.handles[self.handles.len() - 1]
    }

    /// Handle of the deepest key's parent, `None` for a bare root
    pub fn parent_of_leaf(&self) -> Option<Handle> {
        self.handles.len().checked_sub(2).map(|i| self.handles[i])
    }

    /// Number of handles including the root
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Always false; a path holds at least its root
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles in root-first order
    pub fn as_slice(&self) -> &[Handle] {
        &self.handles
    }
}

/// Opens and releases handle chains for one session
#[derive(Debug, Clone)]
pub struct HandlePathResolver {
    session: SessionId,
    access: AccessMask,
}

impl HandlePathResolver {
    /// Resolver for keys rooted in `session`, opening with `access`
    pub fn new(session: SessionId, access: AccessMask) -> Self {
        Self { session, access }
    }

    /// Access mask used for every open
    pub fn access(&self) -> AccessMask {
        self.access
    }

    /// Open every non-root segment from the root down to `key`.
    ///
    /// A root key resolves to its persistent handle without any remote call.
    pub fn open(&self, transport: &mut dyn RemoteRegistryTransport, key: &KeyRef) -> Result<HandlePath> {
        let lineage = key.lineage();
        let root = self.root_handle(&lineage[0], key)?;
        let mut path = HandlePath::from_root(root);

        for segment in &lineage[1..] {
            let name = segment.name();
            match transport.open_child(path.leaf(), &name, self.access) {
                Ok(handle) => {
                    debug!(target: "remreg::path", %handle, name = %name, "Opened key");
                    path.push(handle);
                }
                Err(e) => {
                    let failed_at = segment.absolute_path();
                    debug!(
                        target: "remreg::path",
                        path = %failed_at,
                        error = %e,
                        "Open failed, unwinding partial path"
                    );
                    self.unwind(transport, path);
                    return Err(Error::at_path(e, failed_at));
                }
            }
        }
        Ok(path)
    }

    /// Close every handle after the root, deepest first.
    ///
    /// All handles are attempted even if one close fails; the first failure
    /// is returned.
    pub fn release(&self, transport: &mut dyn RemoteRegistryTransport, path: HandlePath) -> Result<()> {
        let mut first_error: Option<TransportError> = None;
        for &handle in path.handles[1..].iter().rev() {
            match transport.close_handle(handle) {
                Ok(()) => debug!(target: "remreg::path", %handle, "Closed key"),
                Err(e) => {
                    warn!(target: "remreg::path", %handle, error = %e, "Failed to close handle");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(Error::Transport(e)),
            None => Ok(()),
        }
    }

    /// Release after the operation itself already failed. Close failures
    /// were logged by `release`; the operation's error is the one to report.
    pub fn unwind(&self, transport: &mut dyn RemoteRegistryTransport, path: HandlePath) {
        if self.release(transport, path).is_err() {
            debug!(target: "remreg::path", "Unwind left close failures behind");
        }
    }

    fn root_handle(&self, top: &Key, key: &Key) -> Result<Handle> {
        let binding = top.root_binding().ok_or_else(|| {
            Error::InvalidOperation(format!("key '{}' has no persistent root", key.absolute_path()))
        })?;
        if binding.session != self.session {
            return Err(Error::StaleKey {
                path: key.absolute_path(),
            });
        }
        Ok(binding.handle)
    }
}
