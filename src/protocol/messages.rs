//! Handshake messages and inbound chunks
//!
//! Handshake wire layout (little-endian, no padding):
//!
//! ```text
//! byte 0..2  protocol version (u16 LE)
//! byte 2     marker (request = 0x05, response = 0x06)
//! ```

use std::fmt;

use super::{HANDSHAKE_REQUEST_BYTE, HANDSHAKE_RESPONSE_BYTE, HANDSHAKE_SIZE, PROTOCOL_VERSION};

// ─────────────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────────────

/// Handshake request sent by the server to a newly connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub protocol_version: u16,
    pub request_marker: u8,
}

impl HandshakeRequest {
    /// The request a compatible server sends
    pub const fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            request_marker: HANDSHAKE_REQUEST_BYTE,
        }
    }

    /// Decode from the first 3 bytes of `buf`, or `None` if `buf` is short
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: &[u8; HANDSHAKE_SIZE] = buf.get(..HANDSHAKE_SIZE)?.try_into().ok()?;
        Some(Self {
            protocol_version: u16::from_le_bytes([bytes[0], bytes[1]]),
            request_marker: bytes[2],
        })
    }

    pub const fn encode(&self) -> [u8; HANDSHAKE_SIZE] {
        let [lo, hi] = self.protocol_version.to_le_bytes();
        [lo, hi, self.request_marker]
    }
}

/// Handshake response the client writes back on success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub protocol_version: u16,
    pub response_marker: u8,
}

impl HandshakeResponse {
    pub const fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            response_marker: HANDSHAKE_RESPONSE_BYTE,
        }
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: &[u8; HANDSHAKE_SIZE] = buf.get(..HANDSHAKE_SIZE)?.try_into().ok()?;
        Some(Self {
            protocol_version: u16::from_le_bytes([bytes[0], bytes[1]]),
            response_marker: bytes[2],
        })
    }

    pub const fn encode(&self) -> [u8; HANDSHAKE_SIZE] {
        let [lo, hi] = self.protocol_version.to_le_bytes();
        [lo, hi, self.response_marker]
    }
}

// ─────────────────────────────────────────────────────────────────
// Inbound Traffic
// ─────────────────────────────────────────────────────────────────

/// A chunk of bytes exactly as one transport read returned it.
///
/// Chunk boundaries carry no meaning; a server write may arrive split
/// across several messages or merged with the next one.
#[derive(Clone, PartialEq, Eq)]
pub struct InboundMessage(Vec<u8>);

impl InboundMessage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for InboundMessage {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InboundMessage")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
