//! `tokio_util` codec for BattlEye datagrams, used through `UdpFramed`.
//!
//! Every call to [`Decoder::decode`] sees exactly one datagram. The codec
//! always consumes the whole buffer before parsing so a malformed datagram
//! is reported once and then discarded.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RconError;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy, Default)]
pub struct BeCodec {
    verify_checksums: bool,
}

impl BeCodec {
    /// Lenient codec: inbound CRCs are not checked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that rejects inbound datagrams whose CRC does not match.
    pub fn strict() -> Self {
        Self {
            verify_checksums: true,
        }
    }

    pub fn with_verification(verify_checksums: bool) -> Self {
        Self { verify_checksums }
    }

    pub fn verifies_checksums(&self) -> bool {
        self.verify_checksums
    }
}

impl Decoder for BeCodec {
    type Item = Packet;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split_to(src.len());
        let packet = if self.verify_checksums {
            Packet::decode_verified(&datagram)?
        } else {
            Packet::decode(&datagram)?
        };
        Ok(Some(packet))
    }
}

impl Encoder<Packet> for BeCodec {
    type Error = RconError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.encode());
        Ok(())
    }
}
