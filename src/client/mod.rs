//! PFC server client
//!
//! Connection lifecycle:
//! - Dial with fixed-interval retry (`connector`)
//! - 3-byte handshake negotiation (`handshake`)
//! - Duplex session loop until shutdown or link loss (`session`)

mod connector;
mod handshake;
mod session;
mod shutdown;

pub use connector::*;
pub use handshake::*;
pub use session::*;
pub use shutdown::*;

use std::time::Duration;

use tracing::{debug, error, info, info_span, Instrument};

use crate::error::{Error, Result};
use crate::source::MessageSource;

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (`host:port`, or `:port` for the local host)
    pub remote_addr: String,

    /// Pause between failed dial attempts
    pub dial_interval: Duration,

    /// Retries after the first failed dial before giving up
    pub max_dial_attempts: u32,

    /// Bound on the handshake exchange (None = wait forever)
    pub handshake_timeout: Option<Duration>,

    /// Fail the run when the handshake fails instead of logging and continuing
    pub strict_handshake: bool,

    /// Writer tick
    pub write_interval: Duration,

    /// Inbound queue capacity (0 = unbounded)
    pub inbound_queue: usize,
}

impl ClientConfig {
    pub fn new(remote_addr: impl Into<String>, dial_interval: Duration, max_dial_attempts: u32) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            dial_interval,
            max_dial_attempts,
            handshake_timeout: None,
            strict_handshake: false,
            write_interval: Duration::from_secs(2),
            inbound_queue: 0,
        }
    }

    /// Reject settings the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.write_interval.is_zero() {
            return Err(Error::config_field_invalid(
                "session.write_interval_ms",
                "Write interval must be greater than zero",
            ));
        }
        Ok(())
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            write_interval: self.write_interval,
            inbound_queue: self.inbound_queue,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────

/// Dials the server, negotiates, then runs one session
pub struct Client<D = TcpDialer> {
    config: ClientConfig,
    connector: Connector,
    dialer: D,
}

impl Client<TcpDialer> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_dialer(config, TcpDialer::default())
    }
}

impl<D: Dialer> Client<D> {
    pub fn with_dialer(config: ClientConfig, dialer: D) -> Self {
        Self {
            connector: Connector::new(&config),
            config,
            dialer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect, negotiate and run the session.
    ///
    /// Returns `Ok(())` once `shutdown` fires. Fails with `Error::Dial` when
    /// every dial attempt fails and with `Error::ConnectionLost` when the
    /// server drops the session. A failed handshake is logged and the
    /// session runs anyway unless `strict_handshake` is set.
    pub async fn run<S, H>(&self, source: S, handler: H, mut shutdown: ShutdownSignal) -> Result<()>
    where
        S: MessageSource + 'static,
        H: InboundHandler,
    {
        self.config.validate()?;
        let span = info_span!("client", remote = %self.connector.addr());

        async move {
            let mut conn = tokio::select! {
                res = self.connector.connect(&self.dialer) => res?,
                _ = shutdown.closed() => {
                    info!("Shutdown requested while dialing");
                    return Ok(());
                }
            };

            let negotiated = tokio::select! {
                res = negotiate_within(&mut conn, self.config.handshake_timeout) => res,
                _ = shutdown.closed() => {
                    info!("Shutdown requested during handshake");
                    return Ok(());
                }
            };

            let initial = match negotiated {
                Ok(negotiated) => negotiated.trailing,
                Err(e) if self.config.strict_handshake => {
                    error!(error = %e, kind = ?e.kind(), "Handshake failed");
                    return Err(Error::Handshake(e));
                }
                Err(e) => {
                    error!(error = %e, kind = ?e.kind(), "Handshake failed, starting session anyway");
                    None
                }
            };

            let session = Session::new(conn, self.config.session_config());
            debug!(session_id = %session.id(), "Starting session");
            let report = session.run(source, handler, initial, shutdown).await?;

            match report.end {
                SessionEnd::Shutdown => Ok(()),
                SessionEnd::LinkLost { reason } => {
                    Err(Error::connection_lost(self.connector.addr(), reason))
                }
            }
        }
        .instrument(span)
        .await
    }
}
