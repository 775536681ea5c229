//! Typed administrative commands on top of an [`RconTransport`].
//!
//! Every public operation goes through [`RconClient::dispatch`], which
//! composes "ensure authenticated" with the raw command: if the session
//! is down it logs in first, and if that fails the operation returns
//! [`RconError::ServerOffline`] instead of writing into a dead socket.

mod players;

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RconError;
use crate::network::{DEFAULT_LOGIN_TIMEOUT, RconConnection, RconTransport};

pub use players::{Player, parse_players};

/// Channel id that addresses every player in `say`.
pub const EVERYONE: i64 = -1;

// ── ClientOptions ────────────────────────────────────────────────

/// Wait times for the command layer.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for a login triggered by the connection guard.
    pub login_timeout: Duration,
    /// Response window for short commands.
    pub command_wait: Duration,
    /// Response window for `players`, which can span many datagrams.
    pub players_wait: Duration,
    /// Pause between consecutive kicks in `kick_all`.
    pub kick_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            command_wait: Duration::from_secs(1),
            players_wait: Duration::from_secs(3),
            kick_delay: Duration::from_millis(500),
        }
    }
}

// ── Results ──────────────────────────────────────────────────────

/// Best-effort outcome of [`RconClient::kick_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KickSummary {
    pub kicked: usize,
    pub failed: usize,
}

impl fmt::Display for KickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kicked {} player(s)", self.kicked)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// Result of [`RconClient::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub endpoint: String,
    pub authenticated: bool,
    pub players_online: usize,
    pub elapsed_ms: u64,
}

// ── RconClient ───────────────────────────────────────────────────

pub struct RconClient<T: RconTransport = RconConnection> {
    transport: T,
    options: ClientOptions,
}

impl<T: RconTransport> RconClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, ClientOptions::default())
    }

    pub fn with_options(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_authenticated(&self) -> bool {
        self.transport.is_authenticated()
    }

    /// Log in explicitly. Commands do this on demand as well.
    pub async fn connect(&self) -> Result<(), RconError> {
        self.transport.connect(self.options.login_timeout).await
    }

    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    // ── Connection guard ─────────────────────────────────────────

    /// Log in if the session is not authenticated.
    pub async fn ensure_authenticated(&self) -> Result<(), RconError> {
        if self.transport.is_authenticated() {
            return Ok(());
        }
        debug!(server = %self.transport.endpoint(), "session down; reconnecting");
        self.transport
            .connect(self.options.login_timeout)
            .await
            .map_err(|e| RconError::ServerOffline(Box::new(e)))
    }

    /// Guarded raw command: reconnect if needed, then send.
    pub async fn dispatch(&self, command: &str, wait: Duration) -> Result<String, RconError> {
        self.ensure_authenticated().await?;
        self.transport.send_command(command, wait).await
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Run an arbitrary console command.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        self.dispatch(command, self.options.command_wait).await
    }

    /// Players currently on the server, in server order.
    pub async fn list_players(&self) -> Result<Vec<Player>, RconError> {
        let response = self.dispatch("players", self.options.players_wait).await?;
        Ok(parse_players(&response))
    }

    /// Global chat message.
    pub async fn broadcast(&self, message: &str) -> Result<String, RconError> {
        self.execute(&format!("say {EVERYONE} {message}")).await
    }

    /// Private message to one player slot.
    pub async fn whisper(&self, player_id: u32, message: &str) -> Result<String, RconError> {
        self.execute(&format!("say {player_id} {message}")).await
    }

    pub async fn kick(&self, player_id: u32, reason: &str) -> Result<String, RconError> {
        self.execute(&with_reason(format!("kick {player_id}"), reason)).await
    }

    /// Ban a player slot for `minutes`; `0` is permanent.
    pub async fn ban(&self, player_id: u32, minutes: u32, reason: &str) -> Result<String, RconError> {
        self.execute(&with_reason(format!("ban {player_id} {minutes}"), reason))
            .await
    }

    /// Stop new players from joining.
    pub async fn lock(&self) -> Result<String, RconError> {
        self.execute("#lock").await
    }

    pub async fn unlock(&self) -> Result<String, RconError> {
        self.execute("#unlock").await
    }

    /// Kick every connected player, one command at a time.
    ///
    /// A failed kick is logged and skipped; the remaining players are
    /// still kicked and the summary reports what went through.
    pub async fn kick_all(&self, reason: &str) -> Result<KickSummary, RconError> {
        let players = self.list_players().await?;
        let mut summary = KickSummary { kicked: 0, failed: 0 };

        for (i, player) in players.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.options.kick_delay).await;
            }
            match self.kick(player.id, reason).await {
                Ok(_) => summary.kicked += 1,
                Err(e) => {
                    warn!(player = %player.name, id = player.id, error = %e, "kick failed; skipping");
                    summary.failed += 1;
                }
            }
        }

        info!(server = %self.transport.endpoint(), %summary, "kick-all finished");
        Ok(summary)
    }

    /// Log in and fetch the player list as a health check.
    pub async fn test_connection(&self) -> Result<ConnectionReport, RconError> {
        let started = Instant::now();
        let players = self.list_players().await?;
        Ok(ConnectionReport {
            endpoint: self.transport.endpoint(),
            authenticated: self.transport.is_authenticated(),
            players_online: players.len(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

fn with_reason(command: String, reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        command
    } else {
        format!("{command} {reason}")
    }
}

// ── Tests ────────────────────────────────────────────────────────
