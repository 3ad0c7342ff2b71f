//! In-memory registry tree
//!
//! [`MemoryRegistry`] is the "server": a tree of keys and values under the
//! five well-known roots, plus the open-handle table and call accounting.
//! Any number of [`MemoryTransport`](crate::MemoryTransport)s may share one
//! registry, the way several clients share one remote machine.
//!
//! Name lookup is case-insensitive; listing preserves creation order and the
//! original spelling.
//!
//! ## Paging
//!
//! Indexed enumeration is served from a per-handle page buffer, refilled
//! from the tree `page_size` entries at a time. Index 0 always starts a fresh
//! page, and any mutation drops every buffered page.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use remreg_core::{
    ChildEntry, CreateAction, Handle, StatusCode, TransportError, TransportResult, ValueData,
    ValueEntry, ValueType, WellKnownRoot, PATH_SEPARATOR,
};
use tracing::debug;

use crate::fault::{self, Fault, Op};
use crate::transport::MemoryTransport;

type NodeId = usize;

struct StoredValue {
    name: String,
    kind: ValueType,
    data: Vec<u8>,
}

struct Node {
    name: String,
    class: String,
    last_write: DateTime<Utc>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    values: Vec<StoredValue>,
    live: bool,
}

impl Node {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            class: String::new(),
            last_write: Utc::now(),
            parent,
            children: Vec::new(),
            values: Vec::new(),
            live: true,
        }
    }
}

struct OpenHandle {
    node: NodeId,
    root: bool,
}

/// Counters for everything the registry was asked to do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Transport calls received, including failed ones
    pub calls: usize,
    /// Successful `open_root` calls
    pub root_opens: usize,
    /// Root handles closed
    pub root_closes: usize,
    /// Non-root handles opened, by `open_child` or `create_child`
    pub opens: usize,
    /// Non-root handles closed
    pub closes: usize,
    /// Enumeration pages loaded from the tree
    pub round_trips: usize,
    /// Highest number of transport calls observed running at once
    pub max_in_flight: usize,
}

struct State {
    nodes: Vec<Node>,
    roots: Vec<(WellKnownRoot, NodeId)>,
    handles: HashMap<u64, OpenHandle>,
    next_handle: u64,
    page_size: usize,
    value_padding: usize,
    end_of_list: StatusCode,
    call_delay: Option<Duration>,
    severed: bool,
    faults: Vec<Fault>,
    child_pages: HashMap<u64, (u32, Vec<ChildEntry>)>,
    value_pages: HashMap<u64, (u32, Vec<ValueEntry>)>,
    stats: MemoryStats,
    open_log: Vec<String>,
    close_log: Vec<String>,
    delete_log: Vec<String>,
}

fn status(code: StatusCode, message: &str) -> TransportError {
    TransportError::new(code, message)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
}

impl State {
    fn new() -> Self {
        let mut state = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            handles: HashMap::new(),
            next_handle: 0x100,
            page_size: usize::MAX,
            value_padding: 0,
            end_of_list: StatusCode::NO_MORE_ITEMS,
            call_delay: None,
            severed: false,
            faults: Vec::new(),
            child_pages: HashMap::new(),
            value_pages: HashMap::new(),
            stats: MemoryStats::default(),
            open_log: Vec::new(),
            close_log: Vec::new(),
            delete_log: Vec::new(),
        };
        for root in WellKnownRoot::ALL {
            state.nodes.push(Node::new(root.name(), None));
            state.roots.push((root, state.nodes.len() - 1));
        }
        state
    }

    // ========================================================================
    // Tree helpers
    // ========================================================================

    fn root_node(&self, root: WellKnownRoot) -> NodeId {
        self.roots
            .iter()
            .find(|(r, _)| *r == root)
            .map(|(_, id)| *id)
            .unwrap_or(0)
    }

    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name.eq_ignore_ascii_case(name))
    }

    fn find_path(&self, root: WellKnownRoot, path: &str) -> Option<NodeId> {
        let mut node = self.root_node(root);
        for segment in segments(path) {
            node = self.find_child(node, segment)?;
        }
        Some(node)
    }

    fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.nodes.push(Node::new(name, Some(parent)));
        let id = self.nodes.len() - 1;
        self.nodes[parent].children.push(id);
        self.touch(parent);
        id
    }

    fn ensure_path(&mut self, root: WellKnownRoot, path: &str) -> NodeId {
        let mut node = self.root_node(root);
        let names: Vec<String> = segments(path).map(str::to_string).collect();
        for name in names {
            node = match self.find_child(node, &name) {
                Some(child) => child,
                None => self.add_child(node, &name),
            };
        }
        node
    }

    fn path_of(&self, mut node: NodeId) -> String {
        let mut names = vec![self.nodes[node].name.as_str()];
        while let Some(parent) = self.nodes[node].parent {
            names.push(self.nodes[parent].name.as_str());
            node = parent;
        }
        names.reverse();
        names.join(&PATH_SEPARATOR.to_string())
    }

    fn touch(&mut self, node: NodeId) {
        self.nodes[node].last_write = Utc::now();
        self.child_pages.clear();
        self.value_pages.clear();
    }

    fn put_value(&mut self, node: NodeId, name: &str, kind: ValueType, data: Vec<u8>) {
        let values = &mut self.nodes[node].values;
        match values.iter_mut().find(|v| v.name.eq_ignore_ascii_case(name)) {
            Some(existing) => {
                existing.kind = kind;
                existing.data = data;
            }
            None => values.push(StoredValue {
                name: name.to_string(),
                kind,
                data,
            }),
        }
        self.touch(node);
    }

    // ========================================================================
    // Handles
    // ========================================================================

    fn allocate(&mut self, node: NodeId, root: bool) -> Handle {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(raw, OpenHandle { node, root });
        if root {
            self.stats.root_opens += 1;
        } else {
            self.stats.opens += 1;
            let path = self.path_of(node);
            self.open_log.push(path);
        }
        Handle::from_raw(raw)
    }

    fn node_of(&self, handle: Handle) -> TransportResult<NodeId> {
        let open = self
            .handles
            .get(&handle.raw())
            .ok_or_else(|| status(StatusCode::INVALID_PARAMETER, "unknown handle"))?;
        if !self.nodes[open.node].live {
            return Err(status(StatusCode::BADFILE, "key has been deleted"));
        }
        Ok(open.node)
    }

    /// Name used to match faults against a handle-based call
    fn handle_name(&self, handle: Handle) -> String {
        self.handles
            .get(&handle.raw())
            .map(|h| self.nodes[h.node].name.clone())
            .unwrap_or_default()
    }

    fn fault(&mut self, op: Op, name: &str) -> TransportResult<()> {
        fault::check(&mut self.faults, op, name)
    }

    // ========================================================================
    // Transport operations
    // ========================================================================

    fn open_root(&mut self, root: WellKnownRoot) -> TransportResult<Handle> {
        self.fault(Op::OpenRoot, root.name())?;
        let node = self.root_node(root);
        Ok(self.allocate(node, true))
    }

    fn open_child(&mut self, parent: Handle, name: &str) -> TransportResult<Handle> {
        self.fault(Op::OpenChild, name)?;
        let parent = self.node_of(parent)?;
        let child = self
            .find_child(parent, name)
            .ok_or_else(|| status(StatusCode::BADFILE, "key not found"))?;
        Ok(self.allocate(child, false))
    }

    fn close_handle(&mut self, handle: Handle) -> TransportResult<()> {
        let name = self.handle_name(handle);
        self.fault(Op::CloseHandle, &name)?;
        let open = self
            .handles
            .remove(&handle.raw())
            .ok_or_else(|| status(StatusCode::INVALID_PARAMETER, "unknown handle"))?;
        self.child_pages.remove(&handle.raw());
        self.value_pages.remove(&handle.raw());
        if open.root {
            self.stats.root_closes += 1;
        } else {
            self.stats.closes += 1;
            let path = self.path_of(open.node);
            self.close_log.push(path);
        }
        Ok(())
    }

    fn enumerate_child(&mut self, handle: Handle, index: u32) -> TransportResult<ChildEntry> {
        let name = self.handle_name(handle);
        self.fault(Op::EnumerateChild, &name)?;
        let node = self.node_of(handle)?;

        let cached = self
            .child_pages
            .get(&handle.raw())
            .filter(|_| index != 0)
            .and_then(|(start, page)| index.checked_sub(*start).and_then(|i| page.get(i as usize)))
            .cloned();
        if let Some(entry) = cached {
            return Ok(entry);
        }

        let page: Vec<ChildEntry> = self.nodes[node]
            .children
            .iter()
            .skip(index as usize)
            .take(self.page_size)
            .map(|&c| ChildEntry {
                name: self.nodes[c].name.clone(),
                class: self.nodes[c].class.clone(),
                last_write: Some(self.nodes[c].last_write),
            })
            .collect();
        self.stats.round_trips += 1;
        let first = page
            .first()
            .cloned()
            .ok_or_else(|| status(self.end_of_list, "no more items"))?;
        self.child_pages.insert(handle.raw(), (index, page));
        Ok(first)
    }

    fn enumerate_value(&mut self, handle: Handle, index: u32) -> TransportResult<ValueEntry> {
        let name = self.handle_name(handle);
        self.fault(Op::EnumerateValue, &name)?;
        let node = self.node_of(handle)?;

        let cached = self
            .value_pages
            .get(&handle.raw())
            .filter(|_| index != 0)
            .and_then(|(start, page)| index.checked_sub(*start).and_then(|i| page.get(i as usize)))
            .cloned();
        if let Some(entry) = cached {
            return Ok(entry);
        }

        let padding = self.value_padding;
        let page: Vec<ValueEntry> = self.nodes[node]
            .values
            .iter()
            .skip(index as usize)
            .take(self.page_size)
            .map(|v| {
                let mut data = v.data.clone();
                data.resize(v.data.len() + padding, 0);
                ValueEntry {
                    name: v.name.clone(),
                    kind: v.kind,
                    data,
                    length: v.data.len() as u32,
                }
            })
            .collect();
        self.stats.round_trips += 1;
        let first = page
            .first()
            .cloned()
            .ok_or_else(|| status(self.end_of_list, "no more items"))?;
        self.value_pages.insert(handle.raw(), (index, page));
        Ok(first)
    }

    fn create_child(&mut self, parent: Handle, name: &str) -> TransportResult<(Handle, CreateAction)> {
        self.fault(Op::CreateChild, name)?;
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(status(StatusCode::INVALID_PARAMETER, "invalid key name"));
        }
        let parent = self.node_of(parent)?;
        let (child, action) = match self.find_child(parent, name) {
            Some(child) => (child, CreateAction::OpenedExisting),
            None => (self.add_child(parent, name), CreateAction::CreatedNew),
        };
        Ok((self.allocate(child, false), action))
    }

    fn delete_child(&mut self, parent: Handle, name: &str) -> TransportResult<()> {
        self.fault(Op::DeleteChild, name)?;
        let parent = self.node_of(parent)?;
        let child = self
            .find_child(parent, name)
            .ok_or_else(|| status(StatusCode::BADFILE, "key not found"))?;
        if !self.nodes[child].children.is_empty() {
            return Err(status(StatusCode::ACCESS_DENIED, "key has subkeys"));
        }
        let path = self.path_of(child);
        self.nodes[child].live = false;
        self.nodes[parent].children.retain(|&c| c != child);
        self.touch(parent);
        debug!(target: "remreg::memory", path = %path, "Deleted key");
        self.delete_log.push(path);
        Ok(())
    }

    fn set_value(&mut self, handle: Handle, name: &str, kind: ValueType, data: &[u8]) -> TransportResult<()> {
        self.fault(Op::SetValue, name)?;
        let node = self.node_of(handle)?;
        self.put_value(node, name, kind, data.to_vec());
        Ok(())
    }

    fn delete_value(&mut self, handle: Handle, name: &str) -> TransportResult<()> {
        self.fault(Op::DeleteValue, name)?;
        let node = self.node_of(handle)?;
        let values = &mut self.nodes[node].values;
        let before = values.len();
        values.retain(|v| !v.name.eq_ignore_ascii_case(name));
        if values.len() == before {
            return Err(status(StatusCode::BADFILE, "value not found"));
        }
        self.touch(node);
        Ok(())
    }
}

struct Shared {
    state: Mutex<State>,
    in_flight: AtomicUsize,
}

/// A registry tree shared by every transport created from it
#[derive(Clone)]
pub struct MemoryRegistry {
    shared: Arc<Shared>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Registry with the five well-known roots and nothing under them
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// New transport talking to this registry
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport::new(self.clone())
    }

    // ========================================================================
    // Server behavior
    // ========================================================================

    /// Serve at most `n` entries per enumeration round trip (minimum 1)
    pub fn set_page_size(&self, n: usize) {
        self.shared.state.lock().page_size = n.max(1);
    }

    /// Append `n` zero bytes to every enumerated value payload while still
    /// reporting the true length
    pub fn set_value_padding(&self, n: usize) {
        self.shared.state.lock().value_padding = n;
    }

    /// Status returned when an enumeration index is past the end
    pub fn set_end_of_list(&self, code: StatusCode) {
        self.shared.state.lock().end_of_list = code;
    }

    /// Status the transports should treat as end-of-list
    pub fn end_of_list(&self) -> StatusCode {
        self.shared.state.lock().end_of_list
    }

    /// Sleep this long inside every call, outside the tree lock
    pub fn set_call_delay(&self, delay: Duration) {
        self.shared.state.lock().call_delay = Some(delay);
    }

    /// Arm a fault
    pub fn inject(&self, fault: Fault) {
        self.shared.state.lock().faults.push(fault);
    }

    /// Disarm every fault
    pub fn clear_faults(&self) {
        self.shared.state.lock().faults.clear();
    }

    /// Make every later call fail as if the pipe broke
    pub fn sever(&self) {
        self.shared.state.lock().severed = true;
    }

    // ========================================================================
    // Tree building and inspection
    // ========================================================================

    /// Create `path` under `root`, including missing intermediate keys
    pub fn insert_key(&self, root: WellKnownRoot, path: &str) {
        self.shared.state.lock().ensure_path(root, path);
    }

    /// Store a value, creating the key path if needed. The empty name is the
    /// key's default value.
    pub fn insert_value(&self, root: WellKnownRoot, path: &str, name: &str, data: &ValueData) {
        self.insert_raw_value(root, path, name, data.value_type(), data.encode());
    }

    /// Store a raw payload, creating the key path if needed
    pub fn insert_raw_value(&self, root: WellKnownRoot, path: &str, name: &str, kind: ValueType, data: Vec<u8>) {
        let mut state = self.shared.state.lock();
        let node = state.ensure_path(root, path);
        state.put_value(node, name, kind, data);
    }

    /// Whether `path` exists under `root`
    pub fn key_exists(&self, root: WellKnownRoot, path: &str) -> bool {
        self.shared.state.lock().find_path(root, path).is_some()
    }

    /// Subkey names in listing order
    pub fn child_names(&self, root: WellKnownRoot, path: &str) -> Option<Vec<String>> {
        let state = self.shared.state.lock();
        let node = state.find_path(root, path)?;
        Some(
            state.nodes[node]
                .children
                .iter()
                .map(|&c| state.nodes[c].name.clone())
                .collect(),
        )
    }

    /// Value names in listing order, as stored (the default value is `""`)
    pub fn value_names(&self, root: WellKnownRoot, path: &str) -> Option<Vec<String>> {
        let state = self.shared.state.lock();
        let node = state.find_path(root, path)?;
        Some(state.nodes[node].values.iter().map(|v| v.name.clone()).collect())
    }

    /// Type and payload of one value
    pub fn value(&self, root: WellKnownRoot, path: &str, name: &str) -> Option<(ValueType, Vec<u8>)> {
        let state = self.shared.state.lock();
        let node = state.find_path(root, path)?;
        state.nodes[node]
            .values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .map(|v| (v.kind, v.data.clone()))
    }

    // ========================================================================
    // Accounting
    // ========================================================================

    /// Call counters
    pub fn stats(&self) -> MemoryStats {
        self.shared.state.lock().stats.clone()
    }

    /// Open non-root handles
    pub fn live_handles(&self) -> usize {
        self.shared.state.lock().handles.values().filter(|h| !h.root).count()
    }

    /// Open root handles
    pub fn live_root_handles(&self) -> usize {
        self.shared.state.lock().handles.values().filter(|h| h.root).count()
    }

    /// Paths of non-root handles in the order they were opened
    pub fn open_log(&self) -> Vec<String> {
        self.shared.state.lock().open_log.clone()
    }

    /// Paths of non-root handles in the order they were closed
    pub fn close_log(&self) -> Vec<String> {
        self.shared.state.lock().close_log.clone()
    }

    /// Paths of deleted keys in deletion order
    pub fn delete_log(&self) -> Vec<String> {
        self.shared.state.lock().delete_log.clone()
    }

    /// Forget logs and counters, keeping the tree and open handles
    pub fn reset_accounting(&self) {
        let mut state = self.shared.state.lock();
        state.stats = MemoryStats::default();
        state.open_log.clear();
        state.close_log.clear();
        state.delete_log.clear();
    }

    // ========================================================================
    // Transport entry points
    // ========================================================================

    /// Run one transport call: count it, honor the delay and the severed
    /// flag, then apply `f` to the tree
    fn call<T>(&self, f: impl FnOnce(&mut State) -> TransportResult<T>) -> TransportResult<T> {
        let running = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = {
            let mut state = self.shared.state.lock();
            state.stats.calls += 1;
            state.stats.max_in_flight = state.stats.max_in_flight.max(running);
            state.call_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let result = {
            let mut state = self.shared.state.lock();
            if state.severed {
                Err(status(StatusCode::PIPE_BROKEN, "connection closed"))
            } else {
                f(&mut *state)
            }
        };
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    pub(crate) fn open_root(&self, root: WellKnownRoot) -> TransportResult<Handle> {
        self.call(|s| s.open_root(root))
    }

    pub(crate) fn open_child(&self, parent: Handle, name: &str) -> TransportResult<Handle> {
        self.call(|s| s.open_child(parent, name))
    }

    pub(crate) fn close_handle(&self, handle: Handle) -> TransportResult<()> {
        self.call(|s| s.close_handle(handle))
    }

    pub(crate) fn enumerate_child(&self, handle: Handle, index: u32) -> TransportResult<ChildEntry> {
        self.call(|s| s.enumerate_child(handle, index))
    }

    pub(crate) fn enumerate_value(&self, handle: Handle, index: u32) -> TransportResult<ValueEntry> {
        self.call(|s| s.enumerate_value(handle, index))
    }

    pub(crate) fn create_child(&self, parent: Handle, name: &str) -> TransportResult<(Handle, CreateAction)> {
        self.call(|s| s.create_child(parent, name))
    }

    pub(crate) fn delete_child(&self, parent: Handle, name: &str) -> TransportResult<()> {
        self.call(|s| s.delete_child(parent, name))
    }

    pub(crate) fn set_value(&self, handle: Handle, name: &str, kind: ValueType, data: &[u8]) -> TransportResult<()> {
        self.call(|s| s.set_value(handle, name, kind, data))
    }

    pub(crate) fn delete_value(&self, handle: Handle, name: &str) -> TransportResult<()> {
        self.call(|s| s.delete_value(handle, name))
    }

    /// Close every handle in `handles` that is still open, without counting
    /// them as transport calls
    pub(crate) fn release_all(&self, handles: &[Handle]) {
        let mut state = self.shared.state.lock();
        for &handle in handles {
            if state.handles.contains_key(&handle.raw()) {
                let _ = state.close_handle(handle);
            }
        }
    }
}
