//! Connection parameters handed to a [`TransportConnector`](crate::TransportConnector)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::handle::AccessMask;

/// RPC transport used to reach the registry service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Named pipe over SMB (`ncacn_np`)
    #[default]
    Smb,
    /// Plain TCP (`ncacn_ip_tcp`)
    Tcp,
    /// Local RPC (`ncalrpc`)
    Local,
}

impl TransportKind {
    /// Protocol sequence prefix
    pub const fn protocol_sequence(self) -> &'static str {
        match self {
            TransportKind::Smb => "ncacn_np",
            TransportKind::Tcp => "ncacn_ip_tcp",
            TransportKind::Local => "ncalrpc",
        }
    }

    /// Binding string for `server`, e.g. `ncacn_np:fileserver`
    pub fn binding(self, server: &str) -> String {
        format!("{}:{}", self.protocol_sequence(), server)
    }

    /// Parse the config spelling (`smb`, `tcp`, `local`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "smb" => Some(TransportKind::Smb),
            "tcp" => Some(TransportKind::Tcp),
            "local" => Some(TransportKind::Local),
            _ => None,
        }
    }
}

/// Account used to authenticate.
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Domain or workgroup, empty when none was given
    pub domain: String,
    /// Account name without the domain part
    pub username: String,
    password: String,
}

impl Credentials {
    /// Split `DOMAIN\user` or `user@DOMAIN`; anything else is a bare user
    pub fn parse(account: &str, password: impl Into<String>) -> Self {
        let (domain, username) = if let Some((domain, user)) = account.split_once('\\') {
            (domain, user)
        } else if let Some((user, domain)) = account.split_once('@') {
            (domain, user)
        } else {
            ("", account)
        };
        Self {
            domain: domain.to_string(),
            username: username.to_string(),
            password: password.into(),
        }
    }

    /// Secret to present to the server
    pub fn password(&self) -> &str {
        &self.password
    }

    /// `DOMAIN\user`, or just `user` without a domain
    pub fn principal(&self) -> String {
        if self.domain.is_empty() {
            self.username.clone()
        } else {
            format!("{}\\{}", self.domain, self.username)
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a connector needs to open a session
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Server name or address
    pub server: String,
    /// RPC transport
    pub transport: TransportKind,
    /// Account
    pub credentials: Credentials,
    /// Rights requested for every key this session opens
    pub access: AccessMask,
}

impl ConnectParams {
    /// Parameters with the default access mask
    pub fn new(server: impl Into<String>, transport: TransportKind, credentials: Credentials) -> Self {
        Self {
            server: server.into(),
            transport,
            credentials,
            access: AccessMask::default(),
        }
    }

    /// Binding string for the configured transport
    pub fn binding(&self) -> String {
        self.transport.binding(&self.server)
    }
}
