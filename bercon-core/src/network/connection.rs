//! UDP BattlEye RCon connection.
//!
//! One `RconConnection` owns one socket and, while authenticated, one
//! background task that sends keep-alives and feeds inbound response
//! fragments into the shared [`Exchange`].
//!
//! ```text
//! caller ──send_command──► [wire lock] begin seq, send ──► sleep(wait) ──► [wire lock] finish
//!                                 ▲
//! receive task ──datagram──► [wire lock] absorb / ack
//!              ──every 30s─► [wire lock] keep-alive
//! ```

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::udp::UdpFramed;
use tracing::{debug, info, trace, warn};

use crate::codec::BeCodec;
use crate::error::RconError;
use crate::network::{ConnectionOptions, ConnectionParams, RconTransport};
use crate::packet::{Packet, PacketKind};
use crate::state::{ConnectionPhase, Exchange};

type FramedSocket = UdpFramed<BeCodec, Arc<UdpSocket>>;

/// State shared between senders and the receive task.
struct Wire {
    exchange: Exchange,
    sink: Option<FramedSocket>,
}

/// Resources of one authenticated session.
struct Session {
    peer: SocketAddr,
    local: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RconConnection {
    params: ConnectionParams,
    options: ConnectionOptions,
    phase: Arc<StdMutex<ConnectionPhase>>,
    wire: Arc<Mutex<Wire>>,
    /// Serializes whole commands: one in flight per connection.
    dispatch: Mutex<()>,
    /// Serializes login attempts.
    login_gate: Mutex<()>,
    session: StdMutex<Option<Session>>,
}

impl RconConnection {
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_options(params, ConnectionOptions::default())
    }

    pub fn with_options(params: ConnectionParams, options: ConnectionOptions) -> Self {
        Self {
            params,
            options,
            phase: Arc::new(StdMutex::new(ConnectionPhase::default())),
            wire: Arc::new(Mutex::new(Wire {
                exchange: Exchange::new(),
                sink: None,
            })),
            dispatch: Mutex::new(()),
            login_gate: Mutex::new(()),
            session: StdMutex::new(None),
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn phase(&self) -> ConnectionPhase {
        lock(&self.phase).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.phase).is_authenticated()
    }

    /// Local address of the live socket, `None` when closed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.session).as_ref().map(|s| s.local)
    }

    /// Resolved server address of the live session.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        lock(&self.session).as_ref().map(|s| s.peer)
    }

    // ── Login ────────────────────────────────────────────────────

    /// Open a socket, log in and start the background task.
    ///
    /// On any failure the socket is closed again and the connection is
    /// left `Disconnected`; calling `connect` again starts a fresh login.
    pub async fn connect(&self, timeout: Duration) -> Result<(), RconError> {
        let _gate = self.login_gate.lock().await;
        if self.is_authenticated() {
            return Ok(());
        }

        // Leftovers of a session the receive task gave up on.
        self.disconnect().await;
        lock(&self.phase).begin_login()?;

        let (tx, rx, peer, local) = match self.login(timeout).await {
            Ok(link) => link,
            Err(e) => {
                if lock(&self.phase).fail_login().is_err() {
                    debug!(server = %self.params, "session torn down during login");
                }
                warn!(server = %self.params, error = %e, "RCon login failed");
                return Err(e);
            }
        };

        {
            let mut wire = self.wire.lock().await;
            wire.exchange.reset();
            wire.sink = Some(tx);
        }
        let completed = lock(&self.phase).complete_login();
        if let Err(e) = completed {
            drop(self.wire.lock().await.sink.take());
            debug!(server = %self.params, "session torn down during login");
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            rx,
            peer,
            Arc::clone(&self.wire),
            Arc::clone(&self.phase),
            cancel.clone(),
            self.options.keep_alive_interval,
        ));
        *lock(&self.session) = Some(Session {
            peer,
            local,
            cancel,
            task,
        });

        info!(server = %self.params, %local, "RCon session authenticated");
        Ok(())
    }

    async fn login(
        &self,
        timeout: Duration,
    ) -> Result<(FramedSocket, FramedSocket, SocketAddr, SocketAddr), RconError> {
        let deadline = Instant::now() + timeout;
        let peer = self.resolve_peer(deadline, timeout).await?;

        let bind: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(peer).await?;
        let local = socket.local_addr()?;

        let socket = Arc::new(socket);
        let codec = BeCodec::with_verification(self.options.verify_checksums);
        let mut tx = UdpFramed::new(Arc::clone(&socket), codec);
        let mut rx = UdpFramed::new(socket, codec);

        debug!(server = %self.params, "sending login packet");
        tx.send((Packet::login(&self.params.password), peer)).await?;

        loop {
            let next = tokio::time::timeout_at(deadline, rx.next())
                .await
                .map_err(|_| RconError::ConnectionTimeout(timeout))?;
            match next {
                Some(Ok((packet, _))) => match packet.login_accepted() {
                    Some(true) => return Ok((tx, rx, peer, local)),
                    Some(false) => return Err(RconError::AuthenticationFailed),
                    None => trace!(kind = %packet.kind(), "ignoring packet while logging in"),
                },
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(RconError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "socket closed during login",
                    )));
                }
            }
        }
    }

    async fn resolve_peer(&self, deadline: Instant, timeout: Duration) -> Result<SocketAddr, RconError> {
        let lookup = tokio::net::lookup_host((self.params.host.as_str(), self.params.port));
        let mut addrs = tokio::time::timeout_at(deadline, lookup)
            .await
            .map_err(|_| RconError::ConnectionTimeout(timeout))??;
        addrs
            .next()
            .ok_or_else(|| RconError::Config(format!("host {} did not resolve", self.params.host)))
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Send one command and collect the response text that arrives
    /// within `wait`.
    ///
    /// The wait is a fixed sleep: UDP carries no end-of-response marker,
    /// so bulky responses need a longer `wait`. A socket failure, or no
    /// correlated reply at all within `wait`, forces a disconnect so the
    /// next call can log in again.
    pub async fn send_command(&self, command: &str, wait: Duration) -> Result<String, RconError> {
        let _gate = self.dispatch.lock().await;
        if !self.is_authenticated() {
            return Err(RconError::NotAuthenticated);
        }
        let peer = self.peer_addr().ok_or(RconError::NotAuthenticated)?;

        let seq = {
            let mut wire = self.wire.lock().await;
            let seq = wire.exchange.begin();
            let sent = match wire.sink.as_mut() {
                Some(sink) => sink.send((Packet::command(seq, command), peer)).await,
                None => Err(RconError::NotAuthenticated),
            };
            if let Err(e) = sent {
                wire.exchange.finish(seq);
                drop(wire);
                warn!(server = %self.params, command, error = %e, "command dispatch failed; forcing disconnect");
                self.disconnect().await;
                return Err(e);
            }
            seq
        };
        debug!(seq, command, "command sent");

        tokio::time::sleep(wait).await;

        let response = self.wire.lock().await.exchange.finish(seq);
        if !self.is_authenticated() {
            self.disconnect().await;
            return Err(RconError::Transport(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "session closed while awaiting response",
            )));
        }
        let Some(response) = response else {
            warn!(server = %self.params, seq, command, ?wait, "no reply; forcing disconnect");
            self.disconnect().await;
            return Err(RconError::ConnectionTimeout(wait));
        };
        trace!(seq, bytes = response.len(), "response collected");
        Ok(response)
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Stop the background task, close the socket and drop
    /// authentication. Safe to call repeatedly and from any task.
    pub async fn disconnect(&self) {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.cancel.cancel();
            session.task.abort();
        }

        let sink = self.wire.lock().await.sink.take();
        drop(sink);

        let previous = std::mem::take(&mut *lock(&self.phase));
        if previous.is_authenticated() {
            info!(server = %self.params, "RCon session closed");
        }
    }
}

impl Drop for RconConnection {
    fn drop(&mut self) {
        let session = match self.session.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(session) = session {
            session.cancel.cancel();
            session.task.abort();
        }
    }
}

#[async_trait]
impl RconTransport for RconConnection {
    async fn connect(&self, timeout: Duration) -> Result<(), RconError> {
        RconConnection::connect(self, timeout).await
    }

    async fn send_command(&self, command: &str, wait: Duration) -> Result<String, RconError> {
        RconConnection::send_command(self, command, wait).await
    }

    async fn disconnect(&self) {
        RconConnection::disconnect(self).await
    }

    fn is_authenticated(&self) -> bool {
        RconConnection::is_authenticated(self)
    }

    fn endpoint(&self) -> String {
        self.params.to_string()
    }
}

// ── Background task ──────────────────────────────────────────────

async fn receive_loop(
    mut rx: FramedSocket,
    peer: SocketAddr,
    wire: Arc<Mutex<Wire>>,
    phase: Arc<StdMutex<ConnectionPhase>>,
    cancel: CancellationToken,
    keep_alive_every: Duration,
) {
    let mut keep_alive = tokio::time::interval_at(Instant::now() + keep_alive_every, keep_alive_every);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = keep_alive.tick() => {
                if let Err(e) = send_keep_alive(&wire, peer).await {
                    warn!(%peer, error = %e, "keep-alive failed; closing session");
                    close_from_loop(&phase, &cancel);
                    break;
                }
            }
            next = rx.next() => match next {
                Some(Ok((packet, _))) => handle_inbound(&wire, packet, peer).await,
                Some(Err(RconError::Transport(e))) => {
                    warn!(%peer, error = %e, "socket error; closing session");
                    close_from_loop(&phase, &cancel);
                    break;
                }
                Some(Err(e)) => debug!(%peer, error = %e, "dropping datagram"),
                None => {
                    close_from_loop(&phase, &cancel);
                    break;
                }
            }
        }
    }
    debug!(%peer, "receive loop stopped");
}

/// Mark the session dead unless `disconnect()` already owns teardown.
fn close_from_loop(phase: &StdMutex<ConnectionPhase>, cancel: &CancellationToken) {
    if !cancel.is_cancelled() {
        lock(phase).force_disconnect();
    }
}

async fn send_keep_alive(wire: &Mutex<Wire>, peer: SocketAddr) -> Result<(), RconError> {
    let mut wire = wire.lock().await;
    let Some(seq) = wire.exchange.keep_alive_sequence() else {
        trace!("command in flight; skipping keep-alive");
        return Ok(());
    };
    if let Some(sink) = wire.sink.as_mut() {
        sink.send((Packet::keep_alive(seq), peer)).await?;
        debug!(seq, "keep-alive sent");
    }
    Ok(())
}

async fn handle_inbound(wire: &Mutex<Wire>, packet: Packet, peer: SocketAddr) {
    let kind = packet.kind();
    let Some(seq) = packet.sequence() else {
        trace!(%kind, "ignoring unsequenced packet");
        return;
    };

    let mut wire = wire.lock().await;
    if kind == PacketKind::Message {
        if let Some(sink) = wire.sink.as_mut() {
            if let Err(e) = sink.send((Packet::ack(seq), peer)).await {
                debug!(seq, error = %e, "failed to acknowledge server message");
            }
        }
    }
    if wire.exchange.absorb(seq, packet.payload()) {
        trace!(seq, %kind, bytes = packet.payload().len(), "response fragment stored");
    }
}
