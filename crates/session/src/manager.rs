//! Session manager: one connection, one lock, five persistent roots
//!
//! Every remote call goes through [`SessionManager`]. Operations take the
//! transport lock around their remote calls only; UI notification always
//! happens with the lock released.
//!
//! ## Operation shape
//!
//! ```text
//! lock { open handle path }            HandlePathResolver::open
//! lock { enumerate index i } × n       EnumerationPager (list_key only)
//! lock { mutate; close handle path }   HandlePathResolver::release
//! ```
//!
//! Mutations run their open/mutate/release as one critical section.
//! `list_key` releases between pages so concurrent workers interleave.

use std::sync::Arc;

use remreg_core::{
    normalize_default_value, same_name, ConnectParams, CreateAction, Error, Key, KeyRef,
    RemoteRegistryTransport, Result, RootBinding, SessionId, UiNotifier, Value, WellKnownRoot,
    DEFAULT_VALUE_NAME,
};
use tracing::{debug, error, info, warn};

use crate::lock::TransportLock;
use crate::pager::EnumerationPager;
use crate::path::{HandlePath, HandlePathResolver};

/// Default guess of how many children a listing will produce, used to scale
/// the progress fraction
pub const DEFAULT_PROGRESS_ESTIMATE: u32 = 5200;

/// Tunables that are not part of the connect parameters
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Expected number of children when reporting listing progress
    pub progress_estimate: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            progress_estimate: DEFAULT_PROGRESS_ESTIMATE,
        }
    }
}

/// What `list_key` reports to a notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Report a progress fraction per child
    pub progress: bool,
    /// Report a final "Successfully fetched" status
    pub confirm: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            progress: true,
            confirm: true,
        }
    }
}

/// Children and values of one key
#[derive(Debug, Clone, Default)]
pub struct KeyListing {
    /// Subkeys in server order
    pub children: Vec<KeyRef>,
    /// Values in server order, with exactly one default value
    pub values: Vec<Value>,
}

/// Owner of one live connection
pub struct SessionManager {
    id: SessionId,
    server: String,
    lock: TransportLock,
    resolver: HandlePathResolver,
    roots: Vec<KeyRef>,
    options: SessionOptions,
}

impl SessionManager {
    /// Open the five well-known roots on a freshly authenticated transport.
    ///
    /// This is the only place persistent handles are created. If any root
    /// fails to open, the ones already open are closed and the error is
    /// returned.
    pub fn bootstrap(
        mut transport: Box<dyn RemoteRegistryTransport>,
        params: &ConnectParams,
        options: SessionOptions,
    ) -> Result<Self> {
        let id = SessionId::new();
        let mut roots: Vec<KeyRef> = Vec::with_capacity(WellKnownRoot::ALL.len());

        for root in WellKnownRoot::ALL {
            match transport.open_root(root, params.access) {
                Ok(handle) => {
                    debug!(target: "remreg::session", root = %root, %handle, "Opened well-known root");
                    roots.push(Key::root(RootBinding {
                        session: id,
                        root,
                        handle,
                    }));
                }
                Err(e) => {
                    warn!(target: "remreg::session", root = %root, error = %e, "Failed to open well-known root");
                    close_roots(transport.as_mut(), &roots);
                    return Err(Error::at_path(e, root.name()));
                }
            }
        }

        info!(
            target: "remreg::session",
            session = %id,
            server = %params.server,
            binding = %params.binding(),
            "Session established"
        );

        Ok(Self {
            id,
            server: params.server.clone(),
            lock: TransportLock::new(transport),
            resolver: HandlePathResolver::new(id, params.access),
            roots,
            options,
        })
    }

    /// Identity of this session
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Server this session talks to
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Whether the transport is still usable
    pub fn is_connected(&self) -> bool {
        self.lock.is_open()
    }

    /// Snapshot of the well-known roots, taken under the lock
    pub fn well_known_keys(&self) -> Result<Vec<KeyRef>> {
        self.lock.with(|_| Ok(self.roots.clone()))
    }

    /// Root key for `root`
    pub fn root(&self, root: WellKnownRoot) -> Result<KeyRef> {
        let roots = self.well_known_keys()?;
        roots
            .into_iter()
            .find(|k| k.root_binding().map(|b| b.root) == Some(root))
            .ok_or(Error::Disconnected)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List children and values of `key` without reporting anything
    pub fn list_key(&self, key: &KeyRef) -> Result<KeyListing> {
        self.list_key_with(key, None, ListOptions::default())
    }

    /// List children and values of `key`, reporting progress to `notifier`.
    ///
    /// The notifier is only called with the lock released.
    pub fn list_key_with(
        &self,
        key: &KeyRef,
        notifier: Option<&dyn UiNotifier>,
        options: ListOptions,
    ) -> Result<KeyListing> {
        let path = self.lock.with(|t| self.resolver.open(t, key))?;
        let handle = path.leaf();

        let listed = self.page_key(handle, notifier, options);
        let released = self.lock.with(|t| self.resolver.release(t, path));
        let (child_entries, value_entries) = listed.map_err(|e| relabel(e, key))?;
        released?;

        let children: Vec<KeyRef> = child_entries
            .into_iter()
            .map(|entry| Key::child(key, entry.name))
            .collect();
        let mut values: Vec<Value> = value_entries
            .into_iter()
            .map(|entry| {
                let mut data = entry.data;
                data.truncate(entry.length as usize);
                Value::new(key, entry.name, entry.kind, data)
            })
            .collect();
        normalize_default_value(key, &mut values);

        debug!(
            target: "remreg::session",
            path = %key.absolute_path(),
            children = children.len(),
            values = values.len(),
            "Listed key"
        );

        if let Some(notifier) = notifier {
            if options.confirm {
                notifier.report_status(&format!(
                    "Successfully fetched keys and values of {}",
                    key.name()
                ));
            }
        }

        Ok(KeyListing { children, values })
    }

    fn page_key(
        &self,
        handle: remreg_core::Handle,
        notifier: Option<&dyn UiNotifier>,
        options: ListOptions,
    ) -> Result<(Vec<remreg_core::ChildEntry>, Vec<remreg_core::ValueEntry>)> {
        let pager = EnumerationPager::new(&self.lock, handle);
        let estimate = f64::from(self.options.progress_estimate.max(1));

        let children = pager.children(|index, entry| {
            if let Some(notifier) = notifier {
                notifier.report_status(&format!("Fetching key: {}", entry.name));
                let done = f64::from(index);
                if options.progress && done < estimate {
                    notifier.report_progress(done / estimate);
                }
            }
        })?;
        if let (Some(notifier), true) = (notifier, options.progress) {
            notifier.report_progress(1.0);
        }

        let values = pager.values()?;
        Ok((children, values))
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Create `key` under its parent
    pub fn create_key(&self, key: &KeyRef) -> Result<CreateAction> {
        let parent = key
            .parent()
            .ok_or_else(|| Error::InvalidOperation("cannot create a well-known root".to_string()))?;
        let name = key.name();
        let access = self.resolver.access();

        let action = self.on_key(parent, |t, path| {
            let (handle, action) = t
                .create_child(path.leaf(), &name, access)
                .map_err(|e| Error::at_path(e, key.absolute_path()))?;
            path.push(handle);
            Ok(action)
        })?;

        info!(target: "remreg::session", path = %key.absolute_path(), ?action, "Created key");
        Ok(action)
    }

    /// Delete `key` and everything below it.
    ///
    /// Descendants are deleted before their parents (post-order). Returns the
    /// number of keys deleted.
    pub fn remove_key(&self, key: &KeyRef) -> Result<usize> {
        if key.is_root() {
            return Err(Error::InvalidOperation(format!(
                "cannot remove well-known root {}",
                key.name()
            )));
        }

        let mut deleted = 0;
        let mut stack: Vec<(KeyRef, bool)> = vec![(Arc::clone(key), false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                self.delete_one(&current)?;
                deleted += 1;
                continue;
            }
            let listing = self.list_key(&current)?;
            stack.push((current, true));
            stack.extend(listing.children.into_iter().rev().map(|child| (child, false)));
        }

        info!(target: "remreg::session", path = %key.absolute_path(), deleted, "Removed key");
        Ok(deleted)
    }

    fn delete_one(&self, key: &KeyRef) -> Result<()> {
        let name = key.name();
        self.on_key(key, |t, path| {
            let parent = path.parent_of_leaf().ok_or_else(|| {
                Error::InvalidOperation(format!("cannot remove well-known root {}", name))
            })?;
            t.delete_child(parent, &name)
                .map_err(|e| Error::at_path(e, key.absolute_path()))
        })
    }

    /// Rename a key. Not supported: the protocol has no rename, and a
    /// delete + recreate would lose every subkey and value.
    pub fn move_key(&self, key: &KeyRef, old_name: &str) -> Result<()> {
        debug!(
            target: "remreg::session",
            path = %key.absolute_path(),
            old_name,
            "Key rename requested"
        );
        Err(Error::Unsupported {
            operation: "move_key",
        })
    }

    /// Rename `key` to `new_name` after checking that no sibling has that
    /// name, compared without case. Always fails at
    /// [`move_key`](Self::move_key) for a real rename.
    pub fn rename_key(&self, key: &KeyRef, new_name: &str) -> Result<()> {
        let old_name = key.name();
        if old_name == new_name {
            return Ok(());
        }
        let parent = key
            .parent()
            .ok_or_else(|| Error::InvalidOperation("cannot rename a well-known root".to_string()))?;
        let siblings = self.list_key(parent)?.children;
        let taken = siblings.iter().any(|k| {
            let name = k.name();
            same_name(&name, new_name) && !same_name(&name, &old_name)
        });
        if taken {
            return Err(Error::InvalidOperation(format!(
                "key '{}' already exists",
                new_name
            )));
        }
        self.move_key(key, &old_name)?;
        key.rename(new_name);
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Write `value` under its key. The default value is written under the
    /// empty name.
    pub fn set_value(&self, value: &Value) -> Result<()> {
        self.on_key(value.parent(), |t, path| {
            t.set_value(path.leaf(), value.wire_name(), value.kind(), value.raw_data())
                .map_err(|e| Error::at_path(e, value.absolute_path()))
        })?;
        debug!(target: "remreg::session", path = %value.absolute_path(), kind = %value.kind(), "Set value");
        Ok(())
    }

    /// Delete `value` from its key
    pub fn unset_value(&self, value: &Value) -> Result<()> {
        self.on_key(value.parent(), |t, path| {
            t.delete_value(path.leaf(), value.wire_name())
                .map_err(|e| Error::at_path(e, value.absolute_path()))
        })?;
        debug!(target: "remreg::session", path = %value.absolute_path(), "Deleted value");
        Ok(())
    }

    /// Write a new value, refusing if one of that name already exists.
    /// Names are compared the way the server stores them, without case.
    pub fn create_value(&self, value: &Value) -> Result<()> {
        let existing = self.list_key(value.parent())?.values;
        if existing
            .iter()
            .any(|v| same_name(v.wire_name(), value.wire_name()))
        {
            return Err(Error::InvalidOperation(format!(
                "value '{}' already exists",
                value.name()
            )));
        }
        self.set_value(value)
    }

    /// Move `value` from `old_name` to its current name.
    ///
    /// `old_name` is the name the value is stored under on the server, the
    /// empty string for a key's default. Deletes the old name, then writes the new one, inside one critical
    /// section. The protocol has no rename: if the write fails after the
    /// delete succeeded, the value is gone under both names and
    /// [`Error::PartialMove`] is returned.
    pub fn move_value(&self, value: &Value, old_name: &str) -> Result<()> {
        let shown_old = if old_name.is_empty() {
            DEFAULT_VALUE_NAME
        } else {
            old_name
        };
        self.on_key(value.parent(), |t, path| {
            let handle = path.leaf();
            t.delete_value(handle, old_name).map_err(|e| {
                Error::at_path(
                    e,
                    format!("{}\\{}", value.parent().absolute_path(), shown_old),
                )
            })?;
            t.set_value(handle, value.wire_name(), value.kind(), value.raw_data())
                .map_err(|source| {
                    error!(
                        target: "remreg::session",
                        key = %value.parent().absolute_path(),
                        old_name = shown_old,
                        new_name = %value.name(),
                        error = %source,
                        "Value deleted but rewrite failed; value lost"
                    );
                    Error::PartialMove {
                        old_name: shown_old.to_string(),
                        new_name: value.name().to_string(),
                        source,
                    }
                })
        })
    }

    /// Rename `value` to `new_name`, refusing if another value already has
    /// that name without regard to case. A renamed default becomes an
    /// ordinary value.
    pub fn rename_value(&self, value: &mut Value, new_name: &str) -> Result<()> {
        if value.name() == new_name {
            return Ok(());
        }
        let old_name = value.wire_name().to_string();
        let existing = self.list_key(value.parent())?.values;
        let taken = existing.iter().any(|v| {
            same_name(v.wire_name(), new_name) && !same_name(v.wire_name(), &old_name)
        });
        if taken {
            return Err(Error::InvalidOperation(format!(
                "value '{}' already exists",
                new_name
            )));
        }
        let mut renamed = value.clone();
        renamed.set_name(new_name);
        self.move_value(&renamed, &old_name)?;
        value.set_name(new_name);
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the persistent roots and shut the transport down.
    ///
    /// Waits for an in-flight call to finish; does not interrupt it. Calling
    /// this on a closed session is a no-op.
    pub fn disconnect(&self) -> Result<()> {
        let Some(mut transport) = self.lock.take() else {
            return Ok(());
        };
        close_roots(transport.as_mut(), &self.roots);
        let result = transport.shutdown().map_err(Error::Transport);
        info!(target: "remreg::session", session = %self.id, server = %self.server, "Disconnected");
        result
    }

    /// Open `key`'s path, run `op` on it, release the path, all under one
    /// lock acquisition. `op` may append handles; they are released too.
    fn on_key<T>(
        &self,
        key: &KeyRef,
        op: impl FnOnce(&mut dyn RemoteRegistryTransport, &mut HandlePath) -> Result<T>,
    ) -> Result<T> {
        self.lock.with(|t| {
            let mut path = self.resolver.open(t, key)?;
            match op(t, &mut path) {
                Ok(out) => {
                    self.resolver.release(t, path)?;
                    Ok(out)
                }
                Err(e) => {
                    self.resolver.unwind(t, path);
                    Err(e)
                }
            }
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!(target: "remreg::session", error = %e, "Disconnect on drop failed");
        }
    }
}

fn close_roots(transport: &mut dyn RemoteRegistryTransport, roots: &[KeyRef]) {
    for root in roots.iter().rev() {
        if let Some(binding) = root.root_binding() {
            if let Err(e) = transport.close_handle(binding.handle) {
                warn!(target: "remreg::session", root = %binding.root, error = %e, "Failed to close root handle");
            }
        }
    }
}

fn relabel(err: Error, key: &Key) -> Error {
    match err {
        Error::Transport(e) => Error::at_path(e, key.absolute_path()),
        other => other,
    }
}
