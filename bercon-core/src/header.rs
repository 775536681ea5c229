//! The fixed 7-byte prefix carried by every BattlEye datagram.
//!
//! ```text
//! 'B' 'E'   magic        (2)
//! crc32     little-endian (4)  over marker + body
//! 0xFF      marker       (1)
//! ```
//!
//! The checksum never covers the magic bytes or the checksum field itself.

use crate::error::RconError;

/// Magic bytes opening every datagram.
pub const MAGIC: [u8; 2] = *b"BE";

/// Type marker that precedes the packet kind.
pub const MARKER: u8 = 0xFF;

/// Size of magic + checksum + marker.
pub const HEADER_SIZE: usize = 7;

/// CRC-32/ISO-HDLC (reflected 0xEDB88320, init and final XOR 0xFFFFFFFF).
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Parsed datagram prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    checksum: u32,
}

impl PacketHeader {
    /// Build the header for a checksummed region starting at the marker.
    pub fn for_body(marked_body: &[u8]) -> Self {
        Self {
            checksum: crc32(marked_body),
        }
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Serialize magic + checksum. The marker belongs to the checksummed
    /// body and is written by the caller.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE - 1] {
        let mut bytes = [0u8; HEADER_SIZE - 1];
        bytes[0..2].copy_from_slice(&MAGIC);
        bytes[2..6].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Validate magic and marker and extract the checksum.
    pub fn parse(datagram: &[u8]) -> Result<Self, RconError> {
        if datagram.len() < HEADER_SIZE {
            return Err(RconError::malformed(format!(
                "datagram too short: {} < {HEADER_SIZE} bytes",
                datagram.len()
            )));
        }
        if datagram[0..2] != MAGIC {
            return Err(RconError::malformed("invalid magic bytes: expected 'BE'"));
        }
        if datagram[6] != MARKER {
            return Err(RconError::malformed(format!(
                "invalid type marker {:#04x}",
                datagram[6]
            )));
        }
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&datagram[2..6]);
        Ok(Self {
            checksum: u32::from_le_bytes(crc),
        })
    }

    /// Recompute the checksum over `datagram[6..]` and compare.
    pub fn verify(&self, datagram: &[u8]) -> bool {
        datagram.len() >= HEADER_SIZE && crc32(&datagram[HEADER_SIZE - 1..]) == self.checksum
    }
}
