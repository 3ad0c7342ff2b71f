//! [`TransportConnector`] for a [`MemoryRegistry`]

use std::sync::atomic::{AtomicUsize, Ordering};

use remreg_core::{AuthError, ConnectParams, Error, RemoteRegistryTransport, Result, TransportConnector};
use tracing::debug;

use crate::registry::MemoryRegistry;

struct Account {
    principal: String,
    password: String,
}

/// Dials a [`MemoryRegistry`] as if it were the machine `host`.
///
/// Any server name other than `host` is unreachable. With no accounts
/// registered every credential is accepted; otherwise the principal
/// (case-insensitive) and password must match one account.
pub struct MemoryConnector {
    registry: MemoryRegistry,
    host: String,
    accounts: Vec<Account>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    /// Connector serving `registry` under the name `host`
    pub fn new(registry: MemoryRegistry, host: impl Into<String>) -> Self {
        Self {
            registry,
            host: host.into(),
            accounts: Vec::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Accept `principal` (`DOMAIN\user` or `user`) with `password`
    pub fn with_account(mut self, principal: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.push(Account {
            principal: principal.into(),
            password: password.into(),
        });
        self
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn authenticate(&self, params: &ConnectParams) -> std::result::Result<(), AuthError> {
        if !params.server.eq_ignore_ascii_case(&self.host) {
            return Err(AuthError::HostUnreachable {
                host: params.binding(),
            });
        }
        if self.accounts.is_empty() {
            return Ok(());
        }
        let principal = params.credentials.principal();
        let known = self.accounts.iter().any(|a| {
            a.principal.eq_ignore_ascii_case(&principal) && a.password == params.credentials.password()
        });
        if known {
            Ok(())
        } else {
            Err(AuthError::LogonFailure)
        }
    }
}

impl TransportConnector for MemoryConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteRegistryTransport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.authenticate(params).map_err(Error::Auth)?;
        debug!(target: "remreg::memory", binding = %params.binding(), "Accepted connection");
        Ok(Box::new(self.registry.transport()))
    }
}
