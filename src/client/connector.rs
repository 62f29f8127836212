//! Dial with fixed-interval retry
//!
//! The target is a single known server, so there is no backoff: every
//! failed attempt waits `dial_interval` before the next one.

use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::ClientConfig;
use crate::error::{Error, Result};

/// Per-attempt dial timeout
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP keep-alive idle time set on every dialed connection
pub const DIAL_KEEPALIVE: Duration = Duration::from_secs(30);

/// Establishes the transport connection for one attempt
#[async_trait]
pub trait Dialer: Send + Sync {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn dial(&self, addr: &str) -> std::io::Result<Self::Conn>;
}

/// Plain TCP dialer with a per-attempt timeout and keep-alive
#[derive(Debug, Clone)]
pub struct TcpDialer {
    pub timeout: Duration,
    pub keepalive: Duration,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            timeout: DIAL_TIMEOUT,
            keepalive: DIAL_KEEPALIVE,
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&self, addr: &str) -> std::io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("dial timed out after {}s", self.timeout.as_secs()),
                )
            })??;

        let keepalive = TcpKeepalive::new().with_time(self.keepalive);
        SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;
        stream.set_nodelay(true)?;

        Ok(stream)
    }
}

/// Turn `:port` into a dialable local address
pub fn normalize_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("127.0.0.1:{}", port),
        None => addr.to_string(),
    }
}

/// Dials the configured address until it succeeds or attempts run out
#[derive(Debug, Clone)]
pub struct Connector {
    addr: String,
    dial_interval: Duration,
    max_dial_attempts: u32,
}

impl Connector {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            addr: normalize_addr(&config.remote_addr),
            dial_interval: config.dial_interval,
            max_dial_attempts: config.max_dial_attempts,
        }
    }

    /// Address actually dialed
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn exhausted(&self, attempts: u64) -> Error {
        Error::Dial {
            addr: self.addr.clone(),
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        }
    }

    /// Dial until connected.
    ///
    /// Makes at most `max_dial_attempts + 1` attempts; once the failure
    /// count exceeds `max_dial_attempts` it returns `Error::Dial` with that
    /// count.
    pub async fn connect<D: Dialer>(&self, dialer: &D) -> Result<D::Conn> {
        // Wider than the limit so `max_dial_attempts = u32::MAX` cannot overflow
        let mut attempts: u64 = 0;

        loop {
            debug!(addr = %self.addr, attempt = attempts + 1, "Dialing");

            match dialer.dial(&self.addr).await {
                Ok(conn) => {
                    info!(addr = %self.addr, failed_attempts = attempts, "Connected");
                    return Ok(conn);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > u64::from(self.max_dial_attempts) {
                        return Err(self.exhausted(attempts));
                    }

                    warn!(
                        addr = %self.addr,
                        error = %e,
                        attempt = attempts,
                        retry_in_ms = self.dial_interval.as_millis() as u64,
                        "Dial failed, retrying"
                    );
                    tokio::time::sleep(self.dial_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::DuplexStream;

    /// Refuses the first `refusals` dials, then hands out a duplex stream
    struct FlakyDialer {
        refusals: u32,
        dials: AtomicU32,
    }

    impl FlakyDialer {
        fn new(refusals: u32) -> Self {
            Self { refusals, dials: AtomicU32::new(0) }
        }

        fn dials(&self) -> u32 {
            self.dials.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Dialer for FlakyDialer {
        type Conn = DuplexStream;

        async fn dial(&self, _addr: &str) -> std::io::Result<DuplexStream> {
            let n = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.refusals {
                return Err(std::io::ErrorKind::ConnectionRefused.into());
            }
            let (client, _server) = tokio::io::duplex(64);
            Ok(client)
        }
    }

    fn connector(max_dial_attempts: u32) -> Connector {
        Connector::new(&ClientConfig::new(":3000", Duration::from_millis(10), max_dial_attempts))
    }

    #[test]
    fn test_normalize_addr() {
        assert_eq!(normalize_addr(":3000"), "127.0.0.1:3000");
        assert_eq!(normalize_addr("10.1.2.3:3000"), "10.1.2.3:3000");
        assert_eq!(normalize_addr("server.local:3000"), "server.local:3000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts_plus_one() {
        for max in [0u32, 1, 4] {
            // Would accept the (max + 2)-th dial, which must never happen
            let dialer = FlakyDialer::new(max + 1);
            let err = connector(max).connect(&dialer).await.unwrap_err();

            match err {
                Error::Dial { attempts, .. } => assert_eq!(attempts, max + 1),
                other => panic!("expected dial error, got {other:?}"),
            }
            assert_eq!(dialer.dials(), max + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_attempts_keep_retrying() {
        let dialer = FlakyDialer::new(5);
        assert!(connector(u32::MAX).connect(&dialer).await.is_ok());
        assert_eq!(dialer.dials(), 6);
    }

    #[test]
    fn test_attempt_count_saturates_in_error() {
        match connector(u32::MAX).exhausted(u64::from(u32::MAX) + 1) {
            Error::Dial { attempts, .. } => assert_eq!(attempts, u32::MAX),
            other => panic!("expected dial error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_allowed_attempt() {
        let dialer = FlakyDialer::new(3);
        assert!(connector(3).connect(&dialer).await.is_ok());
        assert_eq!(dialer.dials(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_dial_interval_between_attempts() {
        let dialer = FlakyDialer::new(2);
        let connector = Connector::new(&ClientConfig::new(":3000", Duration::from_secs(15), 5));

        let start = tokio::time::Instant::now();
        connector.connect(&dialer).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(31), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_tcp_dialer_connects_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let dialer = TcpDialer::default();
        let (stream, accepted) = tokio::join!(dialer.dial(&addr), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }
}
