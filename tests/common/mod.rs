//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from any suite's
//! main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use parking_lot::Mutex;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

pub use remreg::{
    ConnectParams, Connection, ConnectionState, Credentials, Error, EventQueue, Fault, Key,
    KeyListing, KeyRef, MemoryConnector, MemoryRegistry, Op, Origin, SessionManager,
    SessionOptions, StatusCode, TransportKind, UiEvent, UiNotifier, Value, ValueData, ValueType,
    WellKnownRoot,
};

pub const HKLM: WellKnownRoot = WellKnownRoot::LocalMachine;
pub const HKCU: WellKnownRoot = WellKnownRoot::CurrentUser;

pub const SERVER: &str = "fileserver";
pub const ACCOUNT: &str = "CORP\\alice";
pub const PASSWORD: &str = "hunter2";

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `remreg::*` logs to the test harness' captured output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "remreg=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Sessions
// ============================================================================

pub fn params() -> ConnectParams {
    ConnectParams::new(SERVER, TransportKind::Smb, Credentials::parse(ACCOUNT, PASSWORD))
}

/// Session bootstrapped straight on a fresh transport of `registry`.
pub fn session(registry: &MemoryRegistry) -> Arc<SessionManager> {
    session_with(registry, SessionOptions::default())
}

pub fn session_with(registry: &MemoryRegistry, options: SessionOptions) -> Arc<SessionManager> {
    init_tracing();
    let session = SessionManager::bootstrap(Box::new(registry.transport()), &params(), options)
        .expect("bootstrap against the memory registry");
    Arc::new(session)
}

/// Disconnected connection that accepts [`ACCOUNT`]/[`PASSWORD`] on [`SERVER`].
pub fn connection(registry: &MemoryRegistry) -> Connection {
    init_tracing();
    let connector = MemoryConnector::new(registry.clone(), SERVER).with_account(ACCOUNT, PASSWORD);
    Connection::new(Arc::new(connector), SessionOptions::default())
}

/// Key object for `path` (backslash separated) under `root`.
pub fn key(session: &SessionManager, root: WellKnownRoot, path: &str) -> KeyRef {
    let mut key = session.root(root).expect("root key");
    for segment in path.split('\\').filter(|s| !s.is_empty()) {
        key = Key::child(&key, segment);
    }
    key
}

pub fn names(keys: &[KeyRef]) -> Vec<String> {
    keys.iter().map(|k| k.name()).collect()
}

pub fn value_names(values: &[Value]) -> Vec<String> {
    values.iter().map(|v| v.name().to_string()).collect()
}

// ============================================================================
// Fixtures
// ============================================================================

/// `n` subkeys `k000..` and `n` string values `v000..` under `root\path`.
pub fn populate(registry: &MemoryRegistry, root: WellKnownRoot, path: &str, n: usize) {
    registry.insert_key(root, path);
    for i in 0..n {
        registry.insert_key(root, &format!("{}\\k{:03}", path, i));
        registry.insert_value(
            root,
            path,
            &format!("v{:03}", i),
            &ValueData::String(format!("data {}", i)),
        );
    }
}

pub fn expected_names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{:03}", prefix, i)).collect()
}

// ============================================================================
// Recorder - UiNotifier that keeps every call
// ============================================================================

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<UiEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Error(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Parent paths of every `report_children` call, in order
    pub fn listed(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Children { parent, .. } => Some(parent.absolute_path()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().push(event);
    }
}

impl UiNotifier for Recorder {
    fn report_progress(&self, fraction: f64) {
        self.push(UiEvent::Progress(fraction));
    }

    fn report_status(&self, message: &str) {
        self.push(UiEvent::Status(message.to_string()));
    }

    fn report_children(&self, parent: &KeyRef, children: &[KeyRef]) {
        self.push(UiEvent::Children {
            parent: KeyRef::clone(parent),
            children: children.to_vec(),
        });
    }

    fn report_values(&self, values: &[Value]) {
        self.push(UiEvent::Values(values.to_vec()));
    }

    fn report_error(&self, message: &str) {
        self.push(UiEvent::Error(message.to_string()));
    }

    fn report_search_hit(&self, key: &KeyRef, value: Option<&Value>) {
        self.push(UiEvent::SearchHit {
            key: KeyRef::clone(key),
            value: value.cloned(),
        });
    }

    fn report_search_miss(&self) {
        self.push(UiEvent::SearchMiss);
    }
}

/// Drain `queue` into `ui` until `done` holds or `timeout` passes.
pub fn pump_until(
    queue: &EventQueue,
    ui: &Recorder,
    timeout: Duration,
    done: impl Fn(&Recorder) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done(ui) {
            return true;
        }
        queue.recv_into(ui, Duration::from_millis(20));
    }
    done(ui)
}
