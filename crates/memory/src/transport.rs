//! [`RemoteRegistryTransport`] over a [`MemoryRegistry`]

use remreg_core::{
    AccessMask, ChildEntry, CreateAction, Handle, RemoteRegistryTransport, StatusCode,
    TransportError, TransportResult, ValueEntry, ValueType, WellKnownRoot,
};
use tracing::debug;

use crate::registry::MemoryRegistry;

/// One client connection to an in-memory registry.
///
/// Handles opened through a transport are closed by the server when the
/// transport shuts down, like context handles of a dropped RPC binding.
pub struct MemoryTransport {
    registry: MemoryRegistry,
    opened: Vec<Handle>,
    shut_down: bool,
}

impl MemoryTransport {
    pub(crate) fn new(registry: MemoryRegistry) -> Self {
        Self {
            registry,
            opened: Vec::new(),
            shut_down: false,
        }
    }

    fn live(&self) -> TransportResult<()> {
        if self.shut_down {
            return Err(TransportError::new(StatusCode::PIPE_BROKEN, "transport shut down"));
        }
        Ok(())
    }

    fn track(&mut self, handle: TransportResult<Handle>) -> TransportResult<Handle> {
        if let Ok(h) = &handle {
            self.opened.push(*h);
        }
        handle
    }
}

impl RemoteRegistryTransport for MemoryTransport {
    fn open_root(&mut self, root: WellKnownRoot, _access: AccessMask) -> TransportResult<Handle> {
        self.live()?;
        let handle = self.registry.open_root(root);
        self.track(handle)
    }

    fn open_child(&mut self, parent: Handle, name: &str, _access: AccessMask) -> TransportResult<Handle> {
        self.live()?;
        let handle = self.registry.open_child(parent, name);
        self.track(handle)
    }

    fn close_handle(&mut self, handle: Handle) -> TransportResult<()> {
        self.live()?;
        self.registry.close_handle(handle)?;
        self.opened.retain(|&h| h != handle);
        Ok(())
    }

    fn enumerate_child(&mut self, handle: Handle, index: u32) -> TransportResult<ChildEntry> {
        self.live()?;
        self.registry.enumerate_child(handle, index)
    }

    fn enumerate_value(&mut self, handle: Handle, index: u32) -> TransportResult<ValueEntry> {
        self.live()?;
        self.registry.enumerate_value(handle, index)
    }

    fn create_child(
        &mut self,
        parent: Handle,
        name: &str,
        _access: AccessMask,
    ) -> TransportResult<(Handle, CreateAction)> {
        self.live()?;
        let (handle, action) = self.registry.create_child(parent, name)?;
        self.opened.push(handle);
        Ok((handle, action))
    }

    fn delete_child(&mut self, parent: Handle, name: &str) -> TransportResult<()> {
        self.live()?;
        self.registry.delete_child(parent, name)
    }

    fn set_value(&mut self, handle: Handle, name: &str, kind: ValueType, data: &[u8]) -> TransportResult<()> {
        self.live()?;
        self.registry.set_value(handle, name, kind, data)
    }

    fn delete_value(&mut self, handle: Handle, name: &str) -> TransportResult<()> {
        self.live()?;
        self.registry.delete_value(handle, name)
    }

    fn no_more_items(&self) -> StatusCode {
        self.registry.end_of_list()
    }

    fn shutdown(&mut self) -> TransportResult<()> {
        if self.shut_down {
            return Ok(());
        }
        if !self.opened.is_empty() {
            debug!(target: "remreg::memory", leaked = self.opened.len(), "Server closing handles left open");
        }
        self.registry.release_all(&self.opened);
        self.opened.clear();
        self.shut_down = true;
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
