//! Connection state machine
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!       ▲                       │                  │
//!       └──────auth/transport───┘                  │
//!       └───────────disconnect / transport closed──┘
//! ```
//!
//! A [`Connection`] owns at most one [`SessionManager`] at a time and hands
//! out shared references to it. Connecting again replaces the old session,
//! whose keys then fail with [`Error::StaleKey`].

use parking_lot::Mutex;
use std::sync::Arc;

use remreg_core::{ConnectParams, Error, Result, TransportConnector};
use tracing::{info, warn};

use crate::manager::{SessionManager, SessionOptions};

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session
    Disconnected,
    /// Authenticating and opening roots
    Connecting,
    /// A live session is available
    Connected,
}

enum Slot {
    Disconnected,
    Connecting,
    Connected(Arc<SessionManager>),
}

/// Owner of the current session
pub struct Connection {
    connector: Arc<dyn TransportConnector>,
    options: SessionOptions,
    slot: Mutex<Slot>,
}

impl Connection {
    /// Disconnected connection that will dial through `connector`
    pub fn new(connector: Arc<dyn TransportConnector>, options: SessionOptions) -> Self {
        Self {
            connector,
            options,
            slot: Mutex::new(Slot::Disconnected),
        }
    }

    /// Current state. A session whose transport signalled closure reports
    /// `Disconnected`.
    pub fn state(&self) -> ConnectionState {
        match &*self.slot.lock() {
            Slot::Disconnected => ConnectionState::Disconnected,
            Slot::Connecting => ConnectionState::Connecting,
            Slot::Connected(session) if session.is_connected() => ConnectionState::Connected,
            Slot::Connected(_) => ConnectionState::Disconnected,
        }
    }

    /// The live session
    pub fn session(&self) -> Result<Arc<SessionManager>> {
        match &*self.slot.lock() {
            Slot::Connected(session) if session.is_connected() => Ok(Arc::clone(session)),
            Slot::Connecting => Err(Error::AlreadyConnecting),
            _ => Err(Error::Disconnected),
        }
    }

    /// Authenticate and bootstrap a new session, replacing any current one.
    ///
    /// Fails with [`Error::AlreadyConnecting`] while another attempt runs.
    /// On failure the state falls back to `Disconnected`.
    pub fn connect(&self, params: &ConnectParams) -> Result<Arc<SessionManager>> {
        let previous = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Connecting) {
                return Err(Error::AlreadyConnecting);
            }
            std::mem::replace(&mut *slot, Slot::Connecting)
        };
        if let Slot::Connected(old) = previous {
            if let Err(e) = old.disconnect() {
                warn!(target: "remreg::session", error = %e, "Closing previous session failed");
            }
        }

        info!(
            target: "remreg::session",
            server = %params.server,
            user = %params.credentials.principal(),
            "Connecting"
        );
        let result = self
            .connector
            .connect(params)
            .and_then(|transport| SessionManager::bootstrap(transport, params, self.options.clone()));

        let mut slot = self.slot.lock();
        match result {
            Ok(session) => {
                let session = Arc::new(session);
                *slot = Slot::Connected(Arc::clone(&session));
                Ok(session)
            }
            Err(e) => {
                warn!(target: "remreg::session", server = %params.server, error = %e, "Connect failed");
                *slot = Slot::Disconnected;
                Err(e)
            }
        }
    }

    /// Close the current session. A no-op when already disconnected.
    pub fn disconnect(&self) -> Result<()> {
        let previous = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Connecting) {
                return Err(Error::AlreadyConnecting);
            }
            std::mem::replace(&mut *slot, Slot::Disconnected)
        };
        match previous {
            Slot::Connected(session) => session.disconnect(),
            _ => Ok(()),
        }
    }
}
