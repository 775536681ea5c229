//! Domain-specific error types for the BattlEye RCon client.
//!
//! All fallible operations return `Result<T, RconError>`.
//! No panics on hostile datagrams: every error is typed and the
//! retryable ones are flagged via [`RconError::is_retryable`].

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the RCon client.
#[derive(Debug, Error)]
pub enum RconError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// No login or command reply arrived within the deadline.
    #[error("connection timeout after {0:?}: server not responding")]
    ConnectionTimeout(Duration),

    /// The server answered the login packet with the failure byte.
    #[error("authentication failed: invalid password")]
    AuthenticationFailed,

    /// A datagram was too short or structurally invalid.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u8 },

    // ── Connection Errors ────────────────────────────────────────
    /// A command was attempted on a connection that never logged in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The socket layer reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The connection guard could not (re)establish a session.
    #[error("server offline: {0}")]
    ServerOffline(Box<RconError>),

    /// A connection phase transition was attempted from the wrong state.
    #[error("invalid connection state: {0}")]
    InvalidState(&'static str),

    // ── Configuration Errors ─────────────────────────────────────
    /// Connection parameters could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested server id is not registered.
    #[error("unknown server: {0}")]
    UnknownServer(String),
}

impl RconError {
    /// Returns `true` for transient failures worth a fresh attempt.
    ///
    /// Authentication failures are never retryable: the password has to
    /// change first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionTimeout(_) | Self::MalformedPacket(_) | Self::Transport(_) => true,
            Self::ServerOffline(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Shorthand for building a [`RconError::MalformedPacket`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPacket(reason.into())
    }
}

impl From<toml::de::Error> for RconError {
    fn from(e: toml::de::Error) -> Self {
        RconError::Config(e.to_string())
    }
}
