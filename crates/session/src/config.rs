//! Session configuration via `remreg.toml`
//!
//! Holds everything needed to reach a server except the password, which is
//! supplied at connect time and never written to disk.

use serde::{Deserialize, Serialize};
use std::path::Path;

use remreg_core::{AccessMask, ConnectParams, Credentials, Error, Result, TransportKind};

use crate::manager::{SessionOptions, DEFAULT_PROGRESS_ESTIMATE};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "remreg.toml";

/// Connection settings loaded from `remreg.toml`.
///
/// # Example
///
/// ```toml
/// server = "fileserver"
/// transport = "smb"
/// username = "CORP\\alice"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Server name or address
    #[serde(default = "default_server")]
    pub server: String,
    /// `"smb"`, `"tcp"` or `"local"`
    #[serde(default = "default_transport")]
    pub transport: String,
    /// `DOMAIN\user`, `user@DOMAIN`, or a bare user name
    #[serde(default)]
    pub username: String,
    /// Rights requested for every opened key
    #[serde(default = "default_access_mask")]
    pub access_mask: u32,
    /// Guessed child count used to scale fetch progress
    #[serde(default = "default_progress_estimate")]
    pub progress_estimate: u32,
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_transport() -> String {
    "smb".to_string()
}

fn default_access_mask() -> u32 {
    AccessMask::EDIT.bits()
}

fn default_progress_estimate() -> u32 {
    DEFAULT_PROGRESS_ESTIMATE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            transport: default_transport(),
            username: String::new(),
            access_mask: default_access_mask(),
            progress_estimate: default_progress_estimate(),
        }
    }
}

impl SessionConfig {
    /// Parse the transport string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"smb"`, `"tcp"` or `"local"`.
    pub fn transport_kind(&self) -> Result<TransportKind> {
        TransportKind::parse(&self.transport).ok_or_else(|| {
            Error::Config(format!(
                "Invalid transport '{}' in remreg.toml. Expected \"smb\", \"tcp\" or \"local\".",
                self.transport
            ))
        })
    }

    /// Connect parameters for this config and `password`
    pub fn connect_params(&self, password: impl Into<String>) -> Result<ConnectParams> {
        let mut params = ConnectParams::new(
            self.server.clone(),
            self.transport_kind()?,
            Credentials::parse(&self.username, password),
        );
        params.access = AccessMask::from_bits(self.access_mask);
        Ok(params)
    }

    /// Session tunables
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            progress_estimate: self.progress_estimate,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# remreg connection configuration
#
# Server name or address
server = "localhost"

# RPC transport: "smb" (default), "tcp" or "local"
#   "smb"   = named pipe \PIPE\winreg over SMB
#   "tcp"   = dynamic TCP endpoint
#   "local" = local RPC, same machine only
transport = "smb"

# Account as DOMAIN\user, user@DOMAIN or a bare user name.
# The password is asked for at connect time and never stored here.
username = ""

# Rights requested for every opened key (default 15 = query, set,
# create subkey, enumerate subkeys)
access_mask = 15

# Guessed number of subkeys, used to scale fetch progress
progress_estimate = 5200
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown transport.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: SessionConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.transport_kind()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
