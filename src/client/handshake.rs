//! Handshake negotiation
//!
//! The server speaks first with a 3-byte request; the client validates it
//! and answers with a 3-byte response. Nothing is written back unless the
//! request is valid.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::HandshakeError;
use crate::protocol::{
    HandshakeRequest, HandshakeResponse, InboundMessage, HANDSHAKE_READ_BUFFER,
    HANDSHAKE_REQUEST_BYTE, HANDSHAKE_SIZE, PROTOCOL_VERSION,
};

/// Successful negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// The request the server sent
    pub request: HandshakeRequest,

    /// Bytes that arrived in the same read after the request
    pub trailing: Option<InboundMessage>,
}

/// Run the handshake on `conn`
pub async fn negotiate<C>(conn: &mut C) -> Result<Negotiated, HandshakeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; HANDSHAKE_READ_BUFFER];
    let n = conn.read(&mut buf).await?;

    let request = HandshakeRequest::decode(&buf[..n]).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("handshake request needs {} bytes, got {}", HANDSHAKE_SIZE, n),
        )
    })?;
    debug!(
        protocol_version = request.protocol_version,
        marker = request.request_marker,
        "Received handshake request"
    );

    if request.protocol_version != PROTOCOL_VERSION {
        return Err(HandshakeError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: request.protocol_version,
        });
    }

    if request.request_marker != HANDSHAKE_REQUEST_BYTE {
        return Err(HandshakeError::InvalidMarker {
            expected: HANDSHAKE_REQUEST_BYTE,
            actual: request.request_marker,
        });
    }

    conn.write_all(&HandshakeResponse::current().encode()).await?;
    conn.flush().await?;
    info!(protocol_version = PROTOCOL_VERSION, "Handshake complete");

    let trailing = (n > HANDSHAKE_SIZE).then(|| InboundMessage::from(&buf[HANDSHAKE_SIZE..n]));

    Ok(Negotiated { request, trailing })
}

/// `negotiate` bounded by `timeout`, when one is given
pub async fn negotiate_within<C>(
    conn: &mut C,
    timeout: Option<Duration>,
) -> Result<Negotiated, HandshakeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, negotiate(conn))
            .await
            .map_err(|_| {
                HandshakeError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("handshake timed out after {}ms", limit.as_millis()),
                ))
            })?,
        None => negotiate(conn).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandshakeErrorKind;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_valid_request_gets_response() {
        let mut conn = Builder::new()
            .read(&[0x01, 0x00, 0x05])
            .write(&[0x01, 0x00, 0x06])
            .build();

        let negotiated = negotiate(&mut conn).await.unwrap();
        assert_eq!(negotiated.request, HandshakeRequest::current());
        assert!(negotiated.trailing.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_writes_nothing() {
        for version in [0u16, 2, 0x0100, u16::MAX] {
            let [lo, hi] = version.to_le_bytes();
            // The mock panics on any unexpected write
            let mut conn = Builder::new().read(&[lo, hi, 0x05]).build();

            let err = negotiate(&mut conn).await.unwrap_err();
            assert_eq!(err.kind(), HandshakeErrorKind::VersionMismatch);
        }
    }

    #[tokio::test]
    async fn test_invalid_marker_writes_nothing() {
        for marker in [0x00u8, 0x04, 0x06, 0xff] {
            let mut conn = Builder::new().read(&[0x01, 0x00, marker]).build();

            let err = negotiate(&mut conn).await.unwrap_err();
            assert_eq!(err.kind(), HandshakeErrorKind::InvalidMarker);
        }
    }

    #[tokio::test]
    async fn test_version_checked_before_marker() {
        let mut conn = Builder::new().read(&[0x02, 0x00, 0x09]).build();
        let err = negotiate(&mut conn).await.unwrap_err();
        assert_eq!(err.kind(), HandshakeErrorKind::VersionMismatch);
    }

    #[tokio::test]
    async fn test_short_read_is_io_error() {
        let mut conn = Builder::new().read(&[0x01, 0x00]).build();
        let err = negotiate(&mut conn).await.unwrap_err();
        assert_eq!(err.kind(), HandshakeErrorKind::Io);
    }

    #[tokio::test]
    async fn test_read_error_is_io_error() {
        let mut conn = Builder::new()
            .read_error(std::io::ErrorKind::ConnectionReset.into())
            .build();
        let err = negotiate(&mut conn).await.unwrap_err();
        assert_eq!(err.kind(), HandshakeErrorKind::Io);
    }

    #[tokio::test]
    async fn test_trailing_bytes_are_kept() {
        let mut conn = Builder::new()
            .read(b"\x01\x00\x05PING")
            .write(&[0x01, 0x00, 0x06])
            .build();

        let negotiated = negotiate(&mut conn).await.unwrap();
        assert_eq!(negotiated.trailing, Some(InboundMessage::new("PING")));
    }

    #[tokio::test]
    async fn test_closed_connection_is_io_error() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);

        let err = negotiate(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), HandshakeErrorKind::Io);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_io_error() {
        let (mut client, _server) = tokio::io::duplex(64);

        let err = negotiate_within(&mut client, Some(Duration::from_millis(500)))
            .await
            .unwrap_err();
        match err {
            HandshakeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
