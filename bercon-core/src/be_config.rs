//! BattlEye server configuration discovery and connection-parameter
//! resolution.
//!
//! The game server writes its live RCon settings to
//! `BEServer_x64*.cfg` as `Key Value` lines:
//!
//! ```text
//! RConPassword hunter2
//! RConPort 2306   # comment
//! RConIP 0.0.0.0
//! ```
//!
//! Those values win over cached ones in the [`ServerRecord`]: a restart or
//! reinstall may rewrite the file without the cache noticing.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::RconError;
use crate::network::ConnectionParams;
use crate::registry::ServerRecord;

const FILE_PREFIX: &str = "beserver";
const FILE_EXTENSION: &str = ".cfg";
const ACTIVE_MARKER: &str = "_active_";

// ── BeConfig ─────────────────────────────────────────────────────

/// RCon settings read from a BattlEye config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeConfig {
    pub password: Option<String>,
    pub port: Option<u16>,
    pub ip: Option<IpAddr>,
}

impl BeConfig {
    /// Parse `Key Value` lines; unknown keys and bad values are skipped.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.to_ascii_lowercase().as_str() {
                "rconpassword" => config.password = Some(value.to_string()),
                "rconport" => match value.parse() {
                    Ok(port) => config.port = Some(port),
                    Err(_) => warn!(value, "ignoring invalid RConPort"),
                },
                "rconip" => match value.parse() {
                    Ok(ip) => config.ip = Some(ip),
                    Err(_) => warn!(value, "ignoring invalid RConIP"),
                },
                _ => {}
            }
        }
        config
    }

    pub fn load(path: &Path) -> Result<Self, RconError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }
}

// ── Discovery ────────────────────────────────────────────────────

/// Directories searched for the BattlEye config, most specific first.
fn candidate_dirs(record: &ServerRecord) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(be_path) = &record.be_path {
        dirs.push(be_path.clone());
    }
    for sub in ["battleye", "BattlEye", "profiles/BattlEye", "profiles/battleye"] {
        dirs.push(record.install_path.join(sub));
    }
    dirs.push(record.install_path.clone());
    dirs
}

/// `beserver*.cfg`, matched case-insensitively. DLLs and shared
/// objects sharing the `BEServer` prefix never match.
fn is_config_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with(FILE_PREFIX) && lower.ends_with(FILE_EXTENSION)
}

/// Locate the live BattlEye config for `record`.
///
/// Within the first directory that has candidates, `*_active_*` files
/// (rewritten by the server on every start) beat the template, and newer
/// files beat older ones.
pub fn find_config_file(record: &ServerRecord) -> Option<PathBuf> {
    for dir in candidate_dirs(record) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut candidates: Vec<(bool, SystemTime, PathBuf)> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !is_config_name(&name) {
                    return None;
                }
                let active = name.to_ascii_lowercase().contains(ACTIVE_MARKER);
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((active, modified, entry.path()))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        if let Some((_, _, path)) = candidates.into_iter().next() {
            debug!(path = %path.display(), "found BattlEye config");
            return Some(path);
        }
    }
    None
}

// ── ConfigResolver ───────────────────────────────────────────────

/// Turns a [`ServerRecord`] into dialable [`ConnectionParams`].
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    host_override: Option<IpAddr>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `ip` instead of detecting the host's address.
    pub fn with_host_override(ip: IpAddr) -> Self {
        Self {
            host_override: Some(ip),
        }
    }

    pub fn resolve(&self, record: &ServerRecord) -> Result<ConnectionParams, RconError> {
        let disk = match find_config_file(record) {
            Some(path) => BeConfig::load(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "unreadable BattlEye config; using cached values");
                BeConfig::default()
            }),
            None => {
                debug!(install = %record.install_path.display(), "no BattlEye config on disk");
                BeConfig::default()
            }
        };

        if let (Some(live), Some(cached)) = (disk.port, record.rcon_port) {
            if live != cached {
                info!(live, cached, "on-disk RConPort overrides cached port");
            }
        }

        let port = disk
            .port
            .or(record.rcon_port)
            .ok_or_else(|| RconError::Config("no RCon port configured".into()))?;
        let password = disk
            .password
            .or_else(|| record.rcon_password.clone())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RconError::Config("no RCon password configured".into()))?;
        let host = self.dialable_host(disk.ip, record.host.as_deref());

        Ok(ConnectionParams::new(host, port, password))
    }

    /// Pick an address that can actually be dialed; `0.0.0.0` is a bind
    /// address, not a destination.
    fn dialable_host(&self, disk_ip: Option<IpAddr>, cached: Option<&str>) -> String {
        if let Some(ip) = disk_ip.filter(|ip| !ip.is_unspecified()) {
            return ip.to_string();
        }
        if let Some(host) = cached.map(str::trim).filter(|h| !h.is_empty()) {
            let unspecified = host.parse::<IpAddr>().is_ok_and(|ip| ip.is_unspecified());
            if !unspecified {
                return host.to_string();
            }
        }
        self.host_override
            .or_else(detect_host_ip)
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .to_string()
    }
}

/// Address of the interface that routes outward. No packet is sent:
/// connecting a UDP socket only selects the route.
pub fn detect_host_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
