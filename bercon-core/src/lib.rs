//! # bercon-core
//!
//! BattlEye RCon client library.
//!
//! This crate contains:
//! - **Wire types**: `PacketHeader`, `Packet`, `PacketKind`, multi-part `ResponsePart`
//! - **Codec**: `BeCodec` for datagram I/O via `tokio_util::udp::UdpFramed`
//! - **Network**: `RconConnection`, a UDP session with login, keep-alive and
//!   sequence-correlated responses, behind the `RconTransport` trait
//! - **State**: `ConnectionPhase` and the `Exchange` shared with the receive loop
//! - **Client**: `RconClient` typed admin commands and `Player` parsing
//! - **Config**: BattlEye config discovery (`ConfigResolver`), `ServerRegistry`,
//!   TOML `RconSettings`
//! - **Supervisor**: `RconSupervisor` per-operation connect/execute/disconnect
//! - **Error**: `RconError`, a typed, `thiserror`-based error hierarchy

pub mod be_config;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod network;
pub mod packet;
pub mod registry;
pub mod state;
pub mod supervisor;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use be_config::{BeConfig, ConfigResolver};
pub use client::{ClientOptions, ConnectionReport, KickSummary, Player, RconClient};
pub use codec::BeCodec;
pub use config::RconSettings;
pub use error::RconError;
pub use header::{HEADER_SIZE, PacketHeader};
pub use network::{ConnectionOptions, ConnectionParams, RconConnection, RconTransport};
pub use packet::{MAX_DATAGRAM_SIZE, Packet, PacketKind, ResponsePart};
pub use registry::{ServerConfigProvider, ServerRecord, ServerRegistry};
pub use state::ConnectionPhase;
pub use supervisor::{RconSupervisor, SupervisorOptions};
