//! Server records and the provider interface the supervisor reads them
//! through.
//!
//! `ServerRegistry` is the explicit server-id → record map: built once at
//! startup and changed only through [`ServerRegistry::add`] and
//! [`ServerRegistry::remove`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RconError;

/// What the rest of the system knows about one game server. Port and
/// password are cached values; the on-disk BattlEye config overrides
/// them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRecord {
    /// Server installation directory.
    pub install_path: PathBuf,
    /// Explicit BattlEye directory, when not under `install_path`.
    pub be_path: Option<PathBuf>,
    /// Address to dial when the BattlEye config binds `0.0.0.0`.
    pub host: Option<String>,
    pub rcon_port: Option<u16>,
    pub rcon_password: Option<String>,
}

impl fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRecord")
            .field("install_path", &self.install_path)
            .field("be_path", &self.be_path)
            .field("host", &self.host)
            .field("rcon_port", &self.rcon_port)
            .field(
                "rcon_password",
                &self.rcon_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Source of server records. Read-only from this crate's side.
#[async_trait]
pub trait ServerConfigProvider: Send + Sync {
    async fn server_record(&self, server_id: &str) -> Result<ServerRecord, RconError>;
}

// ── ServerRegistry ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: RwLock<BTreeMap<String, ServerRecord>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = (String, ServerRecord)>) -> Self {
        Self {
            servers: RwLock::new(records.into_iter().collect()),
        }
    }

    /// Register or replace a server; returns the previous record.
    pub fn add(&self, server_id: impl Into<String>, record: ServerRecord) -> Option<ServerRecord> {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(server_id.into(), record)
    }

    pub fn remove(&self, server_id: &str) -> Option<ServerRecord> {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server_id)
    }

    pub fn get(&self, server_id: &str) -> Option<ServerRecord> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
            .cloned()
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.servers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ServerConfigProvider for ServerRegistry {
    async fn server_record(&self, server_id: &str) -> Result<ServerRecord, RconError> {
        self.get(server_id)
            .ok_or_else(|| RconError::UnknownServer(server_id.to_string()))
    }
}
