//! In-process BattlEye server for integration tests.
//!
//! Speaks just enough of the protocol: answers logins, answers commands
//! with scripted replies (empty by default) and records every datagram it
//! receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bercon_core::packet::{Packet, PacketKind};
use bercon_core::{ConnectionParams, RconConnection, ConnectionOptions};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "secret";

/// One scripted reply datagram.
#[derive(Debug, Clone)]
pub struct Reply {
    payload: Vec<u8>,
    /// Added to the command's sequence byte (wrapping).
    seq_shift: u8,
    /// Flip a checksum byte before sending.
    corrupt: bool,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self {
            payload: text.as_bytes().to_vec(),
            seq_shift: 0,
            corrupt: false,
        }
    }

    /// Fragment `index` of a `total`-part response.
    pub fn part(total: u8, index: u8, text: &str) -> Self {
        let mut payload = vec![0x00, total, index];
        payload.extend_from_slice(text.as_bytes());
        Self {
            payload,
            seq_shift: 0,
            corrupt: false,
        }
    }

    /// Reply tagged with a sequence number nobody is waiting for.
    pub fn stale(text: &str) -> Self {
        Self {
            seq_shift: 1,
            ..Self::text(text)
        }
    }

    pub fn corrupt(text: &str) -> Self {
        Self {
            corrupt: true,
            ..Self::text(text)
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub password: String,
    /// Never answer anything.
    pub silent: bool,
    /// Answer logins but never commands.
    pub mute_commands: bool,
    pub replies: HashMap<String, Vec<Reply>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            password: PASSWORD.into(),
            silent: false,
            mute_commands: false,
            replies: HashMap::new(),
        }
    }
}

impl MockConfig {
    pub fn reply(mut self, command: &str, replies: Vec<Reply>) -> Self {
        self.replies.insert(command.to_string(), replies);
        self
    }
}

pub struct MockServer {
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    received: Arc<Mutex<Vec<Packet>>>,
    client: Arc<Mutex<Option<SocketAddr>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(config: MockConfig) -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap(), config).await
    }

    /// Bind a specific address, e.g. to bring a server back on the port
    /// a client already knows.
    pub async fn start_on(addr: SocketAddr, config: MockConfig) -> Self {
        let socket = Arc::new(UdpSocket::bind(addr).await.unwrap());
        let addr = socket.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let client = Arc::new(Mutex::new(None));

        let task = tokio::spawn(serve(
            Arc::clone(&socket),
            config,
            Arc::clone(&received),
            Arc::clone(&client),
        ));

        Self {
            addr,
            socket,
            received,
            client,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::new("127.0.0.1", self.addr.port(), PASSWORD)
    }

    pub fn connection(&self, options: ConnectionOptions) -> RconConnection {
        RconConnection::with_options(self.params(), options)
    }

    pub fn received(&self) -> Vec<Packet> {
        self.received.lock().unwrap().clone()
    }

    pub fn logins(&self) -> usize {
        self.received()
            .iter()
            .filter(|p| p.kind() == PacketKind::Login)
            .count()
    }

    /// `(sequence, text)` of every command datagram, keep-alives included.
    pub fn commands(&self) -> Vec<(u8, String)> {
        self.received()
            .iter()
            .filter(|p| p.kind() == PacketKind::Command)
            .map(|p| {
                (
                    p.sequence().unwrap_or_default(),
                    String::from_utf8_lossy(p.payload()).into_owned(),
                )
            })
            .collect()
    }

    /// Push a server message (`0x02`) to the last client seen.
    pub async fn push_message(&self, seq: u8, text: &str) {
        let client = self.client.lock().unwrap().expect("no client yet");
        let packet = Packet::new(PacketKind::Message, Some(seq), text.as_bytes().to_vec());
        self.socket.send_to(&packet.encode(), client).await.unwrap();
    }

    /// Stop serving and release the port.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

async fn serve(
    socket: Arc<UdpSocket>,
    config: MockConfig,
    received: Arc<Mutex<Vec<Packet>>>,
    client: Arc<Mutex<Option<SocketAddr>>>,
) {
    let mut buf = vec![0u8; 65_536];
    loop {
        let Ok((n, from)) = socket.recv_from(&mut buf).await else {
            continue;
        };
        let Ok(packet) = Packet::decode_verified(&buf[..n]) else {
            continue;
        };
        received.lock().unwrap().push(packet.clone());
        *client.lock().unwrap() = Some(from);
        if config.silent {
            continue;
        }

        match packet.kind() {
            PacketKind::Login => {
                let ok = packet.payload() == config.password.as_bytes();
                let reply = Packet::login_response(ok).encode();
                let _ = socket.send_to(&reply, from).await;
            }
            PacketKind::Command if config.mute_commands => {}
            PacketKind::Command => {
                let seq = packet.sequence().unwrap_or_default();
                let command = String::from_utf8_lossy(packet.payload()).into_owned();
                let replies = config
                    .replies
                    .get(&command)
                    .cloned()
                    .unwrap_or_else(|| vec![Reply::text("")]);
                for reply in replies {
                    let out = Packet::new(
                        PacketKind::Command,
                        Some(seq.wrapping_add(reply.seq_shift)),
                        reply.payload,
                    );
                    let mut bytes = out.encode().to_vec();
                    if reply.corrupt {
                        bytes[2] ^= 0xFF;
                    }
                    let _ = socket.send_to(&bytes, from).await;
                }
            }
            PacketKind::Message => {}
        }
    }
}
