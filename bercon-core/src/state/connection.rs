//! Connection lifecycle state machine.
//!
//! Provides a `ConnectionPhase` enum that models the RCon session
//! lifecycle, with validated transitions that return `Result` instead
//! of panicking.

use std::time::{Duration, Instant};

use crate::error::RconError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of an RCon session.
///
/// ```text
///  Disconnected ──► Authenticating ──► Authenticated
///       ▲                 │                  │
///       └─────────────────┴──────────────────┘
///          (login failure / timeout / disconnect)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// Socket open, login packet sent, waiting for the verdict.
    Authenticating,

    /// Login accepted; commands may be dispatched.
    Authenticated {
        /// When the login was accepted.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Authenticated { .. } => write!(f, "Authenticated"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the session has been authenticated.
    ///
    /// Returns `None` for any other phase.
    pub fn authenticated_for(&self) -> Option<Duration> {
        match self {
            Self::Authenticated { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Authenticating`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_login(&mut self) -> Result<(), RconError> {
        match self {
            Self::Disconnected => {
                *self = Self::Authenticating;
                Ok(())
            }
            _ => Err(RconError::InvalidState(
                "cannot log in: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Authenticated`.
    ///
    /// Valid from: `Authenticating`.
    pub fn complete_login(&mut self) -> Result<(), RconError> {
        match self {
            Self::Authenticating => {
                *self = Self::Authenticated {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(RconError::InvalidState(
                "cannot complete login: not in Authenticating state",
            )),
        }
    }

    /// Transition back to `Disconnected` after a rejected or timed-out
    /// login.
    ///
    /// Valid from: `Authenticating`.
    pub fn fail_login(&mut self) -> Result<(), RconError> {
        match self {
            Self::Authenticating => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(RconError::InvalidState(
                "cannot fail login: not in Authenticating state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Used by `disconnect()` and on socket failure.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
