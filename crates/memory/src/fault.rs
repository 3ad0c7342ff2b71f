//! Fault injection
//!
//! A [`Fault`] makes matching calls fail with a chosen status instead of
//! touching the tree. Faults are checked in insertion order; the first one
//! that matches fires.

use remreg_core::{StatusCode, TransportError};

/// Transport operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `open_root`
    OpenRoot,
    /// `open_child`
    OpenChild,
    /// `close_handle`
    CloseHandle,
    /// `enumerate_child`
    EnumerateChild,
    /// `enumerate_value`
    EnumerateValue,
    /// `create_child`
    CreateChild,
    /// `delete_child`
    DeleteChild,
    /// `set_value`
    SetValue,
    /// `delete_value`
    DeleteValue,
}

/// One injected failure
#[derive(Debug, Clone)]
pub struct Fault {
    op: Op,
    name: Option<String>,
    status: StatusCode,
    remaining: Option<usize>,
}

impl Fault {
    /// Fail every `op` call with `status`
    pub fn new(op: Op, status: StatusCode) -> Self {
        Self {
            op,
            name: None,
            status,
            remaining: None,
        }
    }

    /// Only fire when the call's name argument matches (case-insensitive).
    ///
    /// The name is the child or value name for calls that take one, the
    /// root name for `OpenRoot`, and the name of the key behind the handle
    /// for enumeration and close.
    pub fn on(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fire at most `n` times, then disarm
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Fire once
    pub fn once(self) -> Self {
        self.times(1)
    }

    pub(crate) fn matches(&self, op: Op, name: &str) -> bool {
        self.op == op
            && self.remaining != Some(0)
            && self
                .name
                .as_deref()
                .map_or(true, |n| n.eq_ignore_ascii_case(name))
    }

    pub(crate) fn fire(&mut self) -> TransportError {
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        TransportError::new(self.status, format!("injected {:?} failure", self.op))
    }

    pub(crate) fn is_spent(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Fire the first armed fault matching `op` and `name`, dropping spent ones
pub(crate) fn check(faults: &mut Vec<Fault>, op: Op, name: &str) -> Result<(), TransportError> {
    let hit = faults
        .iter_mut()
        .find(|f| f.matches(op, name))
        .map(Fault::fire);
    faults.retain(|f| !f.is_spent());
    match hit {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
