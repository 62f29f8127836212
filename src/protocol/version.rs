//! Protocol version and handshake marker constants

/// Protocol version this client speaks
pub const PROTOCOL_VERSION: u16 = 1;

/// Marker byte the server puts in its handshake request
pub const HANDSHAKE_REQUEST_BYTE: u8 = 0x05;

/// Marker byte the client puts in its handshake response
pub const HANDSHAKE_RESPONSE_BYTE: u8 = 0x06;

/// Encoded size of a handshake request or response
pub const HANDSHAKE_SIZE: usize = 3;

/// Size of the single read that receives the handshake request
pub const HANDSHAKE_READ_BUFFER: usize = 1024;

/// Size of each session read
pub const SESSION_READ_BUFFER: usize = 2048;
