//! Session transport: connection parameters, the narrow transport trait
//! the command layer is written against, and the UDP implementation.

mod connection;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RconError;

pub use connection::RconConnection;

/// Keep the server-side session alive at this cadence.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default deadline for the login reply.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

// ── ConnectionParams ─────────────────────────────────────────────

/// Where and how to reach one RCon endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── ConnectionOptions ────────────────────────────────────────────

/// Tunables for a single [`RconConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Interval between empty keep-alive commands.
    pub keep_alive_interval: Duration,
    /// Reject inbound datagrams whose CRC32 does not match.
    pub verify_checksums: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            verify_checksums: false,
        }
    }
}

// ── RconTransport ────────────────────────────────────────────────

/// The minimal session interface command helpers are built on.
///
/// Implementations own the socket and all protocol bookkeeping; callers
/// only see text in and text out.
#[async_trait]
pub trait RconTransport: Send + Sync {
    /// Open the session and authenticate, waiting at most `timeout` for
    /// the login verdict. Succeeds immediately if already authenticated.
    async fn connect(&self, timeout: Duration) -> Result<(), RconError>;

    /// Send `command` and return whatever response text arrived within
    /// `wait`.
    async fn send_command(&self, command: &str, wait: Duration) -> Result<String, RconError>;

    /// Close the session. Idempotent.
    async fn disconnect(&self);

    fn is_authenticated(&self) -> bool;

    /// Human-readable endpoint, for logs and reports.
    fn endpoint(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_display_hides_password() {
        let params = ConnectionParams::new("10.0.0.5", 2306, "s3cret");
        assert_eq!(params.to_string(), "10.0.0.5:2306");
        assert!(!format!("{params:?}").contains("s3cret"));
    }

    #[test]
    fn params_display_brackets_ipv6() {
        let params = ConnectionParams::new("::1", 2306, "pw");
        assert_eq!(params.to_string(), "[::1]:2306");
    }

    #[test]
    fn default_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.keep_alive_interval, Duration::from_secs(30));
        assert!(!options.verify_checksums);
    }
}
