//! BattlEye packet model: kind discriminator, optional sequence byte and
//! raw payload.
//!
//! # Wire format
//!
//! ```text
//! Client ──[Login   0x00]  'BE' crc 0xFF 0x00 password ──────────► Server
//! Server ──[Login   0x00]  'BE' crc 0xFF 0x00 0x01|0x00 ─────────► Client
//! Client ──[Command 0x01]  'BE' crc 0xFF 0x01 seq command_text ──► Server
//! Server ──[Command 0x01]  'BE' crc 0xFF 0x01 seq [0x00 n i] text ► Client
//! Server ──[Message 0x02]  'BE' crc 0xFF 0x02 seq text ──────────► Client
//! Client ──[Message 0x02]  'BE' crc 0xFF 0x02 seq ───────────────► Server  (ack)
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::RconError;
use crate::header::{HEADER_SIZE, MARKER, PacketHeader};

/// Largest datagram the client will read.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Success byte carried by a login response.
pub const LOGIN_OK: u8 = 0x01;

// ── PacketKind ───────────────────────────────────────────────────

/// Discriminator byte following the `0xFF` marker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Login request / login response.
    Login = 0x00,
    /// Command request / command response.
    Command = 0x01,
    /// Server message / client acknowledgement.
    Message = 0x02,
}

impl PacketKind {
    /// Login packets carry no sequence byte; everything else does.
    pub fn is_sequenced(self) -> bool {
        !matches!(self, PacketKind::Login)
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = RconError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PacketKind::Login),
            0x01 => Ok(PacketKind::Command),
            0x02 => Ok(PacketKind::Message),
            _ => Err(RconError::UnknownVariant {
                type_name: "PacketKind",
                value,
            }),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Packet ───────────────────────────────────────────────────────

/// One decoded BattlEye datagram.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    sequence: Option<u8>,
    payload: Bytes,
}

impl Packet {
    /// Build a packet. `sequence` is ignored for [`PacketKind::Login`]
    /// and defaults to `0` for sequenced kinds.
    pub fn new(kind: PacketKind, sequence: Option<u8>, payload: impl Into<Bytes>) -> Self {
        let sequence = if kind.is_sequenced() {
            Some(sequence.unwrap_or(0))
        } else {
            None
        };
        Self {
            kind,
            sequence,
            payload: payload.into(),
        }
    }

    /// Login request carrying the RCon password.
    pub fn login(password: &str) -> Self {
        Self::new(PacketKind::Login, None, Bytes::copy_from_slice(password.as_bytes()))
    }

    /// Command request. An empty command is a keep-alive.
    pub fn command(sequence: u8, command: &str) -> Self {
        Self::new(
            PacketKind::Command,
            Some(sequence),
            Bytes::copy_from_slice(command.as_bytes()),
        )
    }

    /// Empty command used to keep the server-side session open.
    pub fn keep_alive(sequence: u8) -> Self {
        Self::new(PacketKind::Command, Some(sequence), Bytes::new())
    }

    /// Acknowledgement of a server message.
    pub fn ack(sequence: u8) -> Self {
        Self::new(PacketKind::Message, Some(sequence), Bytes::new())
    }

    /// Server-side login response (used by test doubles).
    pub fn login_response(success: bool) -> Self {
        let flag = if success { LOGIN_OK } else { 0x00 };
        Self::new(PacketKind::Login, None, Bytes::copy_from_slice(&[flag]))
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn sequence(&self) -> Option<u8> {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// `Some(true)` when this is a successful login response.
    pub fn login_accepted(&self) -> Option<bool> {
        match self.kind {
            PacketKind::Login => Some(self.payload.first() == Some(&LOGIN_OK)),
            _ => None,
        }
    }

    /// Serialize to `MAGIC + CRC32_LE + 0xFF + kind [+ seq] + payload`.
    pub fn encode(&self) -> Bytes {
        let seq_len = usize::from(self.sequence.is_some());
        let mut body = BytesMut::with_capacity(2 + seq_len + self.payload.len());
        body.put_u8(MARKER);
        body.put_u8(self.kind as u8);
        if let Some(seq) = self.sequence {
            body.put_u8(seq);
        }
        body.put_slice(&self.payload);

        let header = PacketHeader::for_body(&body);
        let mut out = BytesMut::with_capacity(HEADER_SIZE - 1 + body.len());
        out.put_slice(&header.to_bytes());
        out.put_slice(&body);
        out.freeze()
    }

    /// Parse a datagram without checking its CRC.
    pub fn decode(datagram: &[u8]) -> Result<Self, RconError> {
        PacketHeader::parse(datagram)?;
        Self::decode_body(datagram)
    }

    /// Parse a datagram and reject it if the CRC does not match.
    pub fn decode_verified(datagram: &[u8]) -> Result<Self, RconError> {
        let header = PacketHeader::parse(datagram)?;
        if !header.verify(datagram) {
            return Err(RconError::malformed("checksum mismatch"));
        }
        Self::decode_body(datagram)
    }

    fn decode_body(datagram: &[u8]) -> Result<Self, RconError> {
        let Some(&kind_byte) = datagram.get(HEADER_SIZE) else {
            return Err(RconError::malformed("missing packet kind"));
        };
        let kind = PacketKind::try_from(kind_byte)
            .map_err(|e| RconError::malformed(e.to_string()))?;

        let rest = &datagram[HEADER_SIZE + 1..];
        let (sequence, payload) = if kind.is_sequenced() {
            match rest.split_first() {
                Some((&seq, payload)) => (Some(seq), payload),
                None => return Err(RconError::malformed("missing sequence byte")),
            }
        } else {
            (None, rest)
        };

        Ok(Self {
            kind,
            sequence,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Login payloads are passwords.
        let payload: &dyn fmt::Debug = match self.kind {
            PacketKind::Login if self.payload.len() > 1 => &"<redacted>",
            _ => &self.payload,
        };
        f.debug_struct("Packet")
            .field("kind", &self.kind)
            .field("sequence", &self.sequence)
            .field("payload", payload)
            .finish()
    }
}

// ── ResponsePart ─────────────────────────────────────────────────

/// A command-response payload, split into its multi-packet header when
/// the server sent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePart<'a> {
    /// Whole response text (or an unindexed fragment of it).
    Single(&'a [u8]),
    /// Indexed fragment `index` of `total`.
    Indexed { total: u8, index: u8, body: &'a [u8] },
}

impl<'a> ResponsePart<'a> {
    /// Detect the `0x00 total index` multi-packet header.
    pub fn parse(payload: &'a [u8]) -> Self {
        match payload {
            [0x00, total, index, body @ ..] if *total > 0 && index < total => {
                ResponsePart::Indexed {
                    total: *total,
                    index: *index,
                    body,
                }
            }
            _ => ResponsePart::Single(payload),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
