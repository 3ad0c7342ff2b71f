//! Paginated enumeration
//!
//! The transport exposes children and values only through indexed calls:
//! "give me item *i*". The pager asks for 0, 1, 2, … until the transport
//! answers with its end-of-list status, which terminates the loop
//! successfully. Any other failure aborts the listing.
//!
//! The lock is taken per index and released before the per-item callback
//! runs, so a long listing interleaves with other workers and the callback
//! may notify the UI.

use remreg_core::{ChildEntry, Error, Handle, RemoteRegistryTransport, Result, TransportResult, ValueEntry};

use crate::lock::TransportLock;

/// Collects every child and value of one open key
pub struct EnumerationPager<'a> {
    lock: &'a TransportLock,
    handle: Handle,
}

impl<'a> EnumerationPager<'a> {
    /// Pager over the key open as `handle`
    pub fn new(lock: &'a TransportLock, handle: Handle) -> Self {
        Self { lock, handle }
    }

    /// All subkeys, in server order. `on_item` sees each entry with its
    /// index, outside the lock.
    pub fn children(&self, on_item: impl FnMut(u32, &ChildEntry)) -> Result<Vec<ChildEntry>> {
        let handle = self.handle;
        self.page(|t, index| t.enumerate_child(handle, index), on_item)
    }

    /// All values, in server order
    pub fn values(&self) -> Result<Vec<ValueEntry>> {
        let handle = self.handle;
        self.page(|t, index| t.enumerate_value(handle, index), |_, _| {})
    }

    fn page<T>(
        &self,
        mut fetch: impl FnMut(&mut dyn RemoteRegistryTransport, u32) -> TransportResult<T>,
        mut on_item: impl FnMut(u32, &T),
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut index: u32 = 0;
        loop {
            let step = self.lock.with(|t| {
                let end_of_list = t.no_more_items();
                match fetch(t, index) {
                    Ok(item) => Ok(Some(item)),
                    Err(e) if e.status == end_of_list => Ok(None),
                    Err(e) => Err(Error::Transport(e)),
                }
            })?;
            match step {
                Some(item) => {
                    on_item(index, &item);
                    items.push(item);
                }
                None => return Ok(items),
            }
            index = index.checked_add(1).ok_or_else(|| {
                Error::InvalidOperation("enumeration never reported its end".to_string())
            })?;
        }
    }
}
