//! Shared test fixtures and a scripted PFC server

#![allow(dead_code)]

use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use pfc_client::protocol::{HandshakeRequest, HandshakeResponse, HANDSHAKE_REQUEST_BYTE};

/// Path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Handshake request a well-behaved server sends (version 1, marker 0x05)
pub const GOOD_REQUEST: [u8; 3] = HandshakeRequest::current().encode();

/// Response the client must send back
pub const EXPECTED_RESPONSE: HandshakeResponse = HandshakeResponse::current();

/// A well-formed request announcing another protocol version
pub fn request_with_version(protocol_version: u16) -> [u8; 3] {
    HandshakeRequest {
        protocol_version,
        request_marker: HANDSHAKE_REQUEST_BYTE,
    }
    .encode()
}

/// Bind a listener on an ephemeral local port
pub async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// A local address nothing listens on
pub async fn unused_addr() -> String {
    let (listener, addr) = listen().await;
    drop(listener);
    addr
}

/// Accept one connection, send `request` and return the socket
pub async fn accept_and_greet(listener: &TcpListener, request: &[u8]) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    stream.write_all(request).await.unwrap();
    stream
}

/// Read and decode exactly the 3-byte handshake response
pub async fn read_response(stream: &mut TcpStream) -> HandshakeResponse {
    let mut buf = [0u8; 3];
    stream.read_exact(&mut buf).await.unwrap();
    HandshakeResponse::decode(&buf).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_bytes() {
        assert_eq!(GOOD_REQUEST, [0x01, 0x00, 0x05]);
        assert_eq!(request_with_version(2), [0x02, 0x00, 0x05]);
        assert_eq!(EXPECTED_RESPONSE.encode(), [0x01, 0x00, 0x06]);
    }

    #[test]
    fn test_fixtures_exist() {
        assert!(valid_config_fixture().exists());
        assert!(invalid_config_fixture().exists());
    }
}
