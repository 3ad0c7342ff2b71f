//! Registry keys
//!
//! A [`Key`] is one path segment plus a link to its parent. Parents never own
//! their children: child lists belong to whoever listed them (the UI, a
//! search stack), so the upward links cannot form a cycle.
//!
//! ## Paths
//!
//! The absolute path is the `\`-joined chain of names from the root down to
//! the key. It is recomputed on every call because [`Key::rename`] mutates
//! the name in place and every descendant must observe the new path.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::handle::{Handle, SessionId, WellKnownRoot};

/// Separator between path segments
pub const PATH_SEPARATOR: char = '\\';

/// Shared reference to a key
pub type KeyRef = Arc<Key>;

/// Persistent handle of a well-known root, tagged with the session that
/// opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootBinding {
    /// Session that opened the root
    pub session: SessionId,
    /// Which root this is
    pub root: WellKnownRoot,
    /// Handle kept open for the session lifetime
    pub handle: Handle,
}

/// A node in the remote key hierarchy
pub struct Key {
    name: RwLock<String>,
    parent: Option<KeyRef>,
    binding: Option<RootBinding>,
}

impl Key {
    /// Create a well-known root key bound to its persistent handle
    pub fn root(binding: RootBinding) -> KeyRef {
        Arc::new(Key {
            name: RwLock::new(binding.root.name().to_string()),
            parent: None,
            binding: Some(binding),
        })
    }

    /// Create a child of `parent`
    pub fn child(parent: &KeyRef, name: impl Into<String>) -> KeyRef {
        Arc::new(Key {
            name: RwLock::new(name.into()),
            parent: Some(Arc::clone(parent)),
            binding: None,
        })
    }

    /// Current name of this key
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Rename in place. Paths of this key and its descendants change with it.
    pub fn rename(&self, new_name: impl Into<String>) {
        *self.name.write() = new_name.into();
    }

    /// Parent key, `None` for roots
    pub fn parent(&self) -> Option<&KeyRef> {
        self.parent.as_ref()
    }

    /// Whether this is a well-known root
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Persistent handle binding (roots only)
    pub fn root_binding(&self) -> Option<RootBinding> {
        self.binding
    }

    /// Number of segments in the path; roots have depth 1
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cursor = self.parent.as_ref();
        while let Some(key) = cursor {
            depth += 1;
            cursor = key.parent.as_ref();
        }
        depth
    }

    /// Keys from the root down to and including `self`
    pub fn lineage(self: &Arc<Self>) -> Vec<KeyRef> {
        let mut chain = vec![Arc::clone(self)];
        let mut cursor = self.parent.as_ref();
        while let Some(key) = cursor {
            chain.push(Arc::clone(key));
            cursor = key.parent.as_ref();
        }
        chain.reverse();
        chain
    }

    /// The top-most ancestor (or `self` for a root)
    pub fn top(&self) -> &Key {
        let mut key = self;
        while let Some(parent) = key.parent.as_deref() {
            key = parent;
        }
        key
    }

    /// `\`-joined names from the root down to this key
    pub fn absolute_path(&self) -> String {
        let mut segments = vec![self.name()];
        let mut cursor = self.parent.as_ref();
        while let Some(key) = cursor {
            segments.push(key.name());
            cursor = key.parent.as_ref();
        }
        segments.reverse();
        segments.join(&PATH_SEPARATOR.to_string())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("path", &self.absolute_path())
            .field("binding", &self.binding)
            .finish()
    }
}
