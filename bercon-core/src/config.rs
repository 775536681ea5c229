//! TOML configuration for RCon tooling.
//!
//! ```toml
//! host_override = "203.0.113.7"
//!
//! [connection]
//! keep_alive_secs = 30
//! verify_checksums = false
//!
//! [logging]
//! level = "info"
//!
//! [servers.chernarus]
//! install_path = "/srv/dayz/chernarus"
//! rcon_port = 2306
//! rcon_password = "changeme"
//! ```

use std::collections::BTreeMap;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::be_config::ConfigResolver;
use crate::client::ClientOptions;
use crate::error::RconError;
use crate::network::ConnectionOptions;
use crate::registry::{ServerRecord, ServerRegistry};
use crate::supervisor::SupervisorOptions;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RconSettings {
    /// Address dialed when a BattlEye config binds `0.0.0.0`. Detected
    /// from the routing table when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_override: Option<IpAddr>,
    pub connection: ConnectionSettings,
    pub logging: LoggingSettings,
    /// Known servers by id.
    pub servers: BTreeMap<String, ServerRecord>,
}

/// Session timing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub login_timeout_ms: u64,
    pub keep_alive_secs: u64,
    /// Response window for ordinary commands.
    pub command_wait_ms: u64,
    /// Response window for `players`.
    pub players_wait_ms: u64,
    pub kick_delay_ms: u64,
    /// Drop inbound datagrams with a bad CRC32.
    pub verify_checksums: bool,
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            login_timeout_ms: 5000,
            keep_alive_secs: 30,
            command_wait_ms: 1000,
            players_wait_ms: 3000,
            kick_delay_ms: 500,
            verify_checksums: false,
            connect_retries: 1,
            retry_backoff_ms: 1000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RconSettings {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, RconError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, RconError> {
        toml::to_string_pretty(self).map_err(|e| RconError::Config(e.to_string()))
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> io::Result<()> {
        let text = Self::default()
            .to_toml()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }

    /// Runtime options for a single connection.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            keep_alive_interval: Duration::from_secs(self.connection.keep_alive_secs.max(1)),
            verify_checksums: self.connection.verify_checksums,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        let c = &self.connection;
        ClientOptions {
            login_timeout: Duration::from_millis(c.login_timeout_ms),
            command_wait: Duration::from_millis(c.command_wait_ms),
            players_wait: Duration::from_millis(c.players_wait_ms),
            kick_delay: Duration::from_millis(c.kick_delay_ms),
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            connection: self.connection_options(),
            client: self.client_options(),
            connect_retries: self.connection.connect_retries,
            retry_backoff: Duration::from_millis(self.connection.retry_backoff_ms),
        }
    }

    pub fn resolver(&self) -> ConfigResolver {
        match self.host_override {
            Some(ip) => ConfigResolver::with_host_override(ip),
            None => ConfigResolver::new(),
        }
    }

    /// Registry seeded with the `[servers]` table.
    pub fn registry(&self) -> ServerRegistry {
        ServerRegistry::from_records(self.servers.clone())
    }
}

// ── Tests ────────────────────────────────────────────────────────
