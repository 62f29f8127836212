//! Duplex session loop
//!
//! Owns the connection once the handshake is over:
//! - a reader task pushes every chunk it reads onto the inbound queue
//! - a writer task sends the source's payload on every tick
//! - the coordinator (the caller's task) hands inbound chunks to the
//!   handler until shutdown is requested or the reader hits end-of-stream,
//!   then tears everything down and closes the connection once
//!
//! State machine: `Idle -> Running -> Closing -> Closed`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::shutdown::ShutdownSignal;
use crate::error::{Error, Result};
use crate::protocol::{InboundMessage, SESSION_READ_BUFFER};
use crate::source::MessageSource;

// ─────────────────────────────────────────────────────────────────
// Configuration & State
// ─────────────────────────────────────────────────────────────────

/// Session loop settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Writer tick; the first send happens one full interval after start
    pub write_interval: Duration,

    /// Inbound queue capacity (0 = unbounded)
    pub inbound_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_interval: Duration::from_secs(2),
            inbound_queue: 0,
        }
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, `run` not entered yet
    #[default]
    Idle,
    /// Reader and writer are live
    Running,
    /// Teardown in progress
    Closing,
    /// Connection closed, tasks finished
    Closed,
}

/// Read-only view of a session's state, usable from other tasks
#[derive(Debug, Clone, Default)]
pub struct SessionStatus(Arc<RwLock<SessionState>>);

impl SessionStatus {
    pub fn get(&self) -> SessionState {
        *self.0.read()
    }

    fn set(&self, state: SessionState) {
        *self.0.write() = state;
    }
}

/// Why the session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The external shutdown signal fired
    Shutdown,
    /// The reader hit end-of-stream or a read error
    LinkLost { reason: String },
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub messages_received: u64,
    pub payloads_sent: u64,
    pub write_failures: u64,
}

// ─────────────────────────────────────────────────────────────────
// Inbound Handling
// ─────────────────────────────────────────────────────────────────

/// Consumer of inbound chunks, called on the coordinator's task
pub trait InboundHandler: Send {
    fn handle(&mut self, msg: InboundMessage);
}

/// Logs every inbound chunk
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl InboundHandler for LogHandler {
    fn handle(&mut self, msg: InboundMessage) {
        info!(bytes = msg.len(), message = %msg, "Received message");
    }
}

/// Forwards chunks to an application channel
impl InboundHandler for mpsc::UnboundedSender<InboundMessage> {
    fn handle(&mut self, msg: InboundMessage) {
        if self.send(msg).is_err() {
            debug!("Inbound receiver dropped, discarding message");
        }
    }
}

impl<F> InboundHandler for F
where
    F: FnMut(InboundMessage) + Send,
{
    fn handle(&mut self, msg: InboundMessage) {
        self(msg)
    }
}

/// Sending side of the reader -> coordinator queue
enum InboundTx {
    Unbounded(mpsc::UnboundedSender<InboundMessage>),
    Bounded(mpsc::Sender<InboundMessage>),
}

impl InboundTx {
    /// Returns false once the coordinator has closed the queue
    async fn send(&self, msg: InboundMessage) -> bool {
        match self {
            InboundTx::Unbounded(tx) => tx.send(msg).is_ok(),
            InboundTx::Bounded(tx) => tx.send(msg).await.is_ok(),
        }
    }
}

/// Receiving side of the reader -> coordinator queue
enum InboundRx {
    Unbounded(mpsc::UnboundedReceiver<InboundMessage>),
    Bounded(mpsc::Receiver<InboundMessage>),
}

impl InboundRx {
    async fn recv(&mut self) -> Option<InboundMessage> {
        match self {
            InboundRx::Unbounded(rx) => rx.recv().await,
            InboundRx::Bounded(rx) => rx.recv().await,
        }
    }

    fn close(&mut self) {
        match self {
            InboundRx::Unbounded(rx) => rx.close(),
            InboundRx::Bounded(rx) => rx.close(),
        }
    }
}

/// Capacity 0 selects an unbounded queue; anything else applies backpressure
fn inbound_queue(capacity: usize) -> (InboundTx, InboundRx) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (InboundTx::Unbounded(tx), InboundRx::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (InboundTx::Bounded(tx), InboundRx::Bounded(rx))
    }
}

// ─────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────

/// A live connection after the handshake
pub struct Session<C> {
    id: Uuid,
    conn: C,
    config: SessionConfig,
    status: SessionStatus,
}

impl<C> Session<C>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(conn: C, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            conn,
            config,
            status: SessionStatus::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for observing the state while `run` executes
    pub fn status(&self) -> SessionStatus {
        self.status.clone()
    }

    /// Run until shutdown or link loss.
    ///
    /// `initial` is delivered to the handler before anything read by the
    /// session itself.
    pub async fn run<S, H>(
        self,
        source: S,
        mut handler: H,
        initial: Option<InboundMessage>,
        mut shutdown: ShutdownSignal,
    ) -> Result<SessionReport>
    where
        S: MessageSource + 'static,
        H: InboundHandler,
    {
        // tokio intervals panic on a zero period
        if self.config.write_interval.is_zero() {
            return Err(Error::config_field_invalid(
                "session.write_interval_ms",
                "Write interval must be greater than zero",
            ));
        }

        let span = info_span!("session", id = %self.id);
        let Session { conn, config, status, .. } = self;

        async move {
            status.set(SessionState::Running);
            info!(
                write_interval_ms = config.write_interval.as_millis() as u64,
                source = source.name(),
                "Session started"
            );

            let (read_half, write_half) = tokio::io::split(conn);
            let (inbound_tx, mut inbound_rx) = inbound_queue(config.inbound_queue);
            let (closing_tx, closing_rx) = watch::channel(false);

            let reader = tokio::spawn(
                read_loop(read_half, inbound_tx, closing_rx.clone()).in_current_span(),
            );
            let writer = tokio::spawn(
                write_loop(write_half, source, config.write_interval, closing_rx).in_current_span(),
            );

            let mut messages_received = 0u64;
            if let Some(msg) = initial {
                messages_received += 1;
                handler.handle(msg);
            }

            let trigger = loop {
                tokio::select! {
                    msg = inbound_rx.recv() => match msg {
                        Some(msg) => {
                            messages_received += 1;
                            handler.handle(msg);
                        }
                        // Reader finished and dropped its sender
                        None => break Trigger::ReaderDone,
                    },
                    _ = shutdown.closed() => break Trigger::Shutdown,
                }
            };

            status.set(SessionState::Closing);
            debug!(trigger = ?trigger, "Session closing");

            closing_tx.send_replace(true);
            inbound_rx.close();

            let (read_half, read_end) = reader
                .await
                .map_err(|e| Error::Internal(format!("session reader task failed: {}", e)))?;
            let (write_half, stats) = writer
                .await
                .map_err(|e| Error::Internal(format!("session writer task failed: {}", e)))?;

            let mut conn = read_half.unsplit(write_half);
            if let Err(e) = conn.shutdown().await {
                debug!(error = %e, "Connection shutdown reported an error");
            }
            drop(conn);
            status.set(SessionState::Closed);

            let end = match trigger {
                Trigger::Shutdown => SessionEnd::Shutdown,
                Trigger::ReaderDone => SessionEnd::LinkLost {
                    reason: read_end.describe(),
                },
            };

            info!(
                end = ?end,
                messages_received,
                payloads_sent = stats.sent,
                write_failures = stats.failed,
                "Session closed"
            );

            Ok(SessionReport {
                end,
                messages_received,
                payloads_sent: stats.sent,
                write_failures: stats.failed,
            })
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug)]
enum Trigger {
    Shutdown,
    ReaderDone,
}

// ─────────────────────────────────────────────────────────────────
// Reader
// ─────────────────────────────────────────────────────────────────

/// How the reader task finished
#[derive(Debug)]
enum ReadEnd {
    Eof,
    Failed(std::io::Error),
    Stopped,
}

impl ReadEnd {
    fn describe(&self) -> String {
        match self {
            ReadEnd::Eof => "end of stream".to_string(),
            ReadEnd::Failed(e) => format!("read error: {}", e),
            ReadEnd::Stopped => "stopped".to_string(),
        }
    }
}

async fn read_loop<C>(
    mut reader: ReadHalf<C>,
    inbound: InboundTx,
    mut closing: watch::Receiver<bool>,
) -> (ReadHalf<C>, ReadEnd)
where
    C: AsyncRead,
{
    let mut buf = vec![0u8; SESSION_READ_BUFFER];

    let end = loop {
        tokio::select! {
            biased;
            _ = closing.changed() => break ReadEnd::Stopped,
            res = reader.read(&mut buf) => match res {
                Ok(0) => {
                    info!("Server closed the connection");
                    break ReadEnd::Eof;
                }
                Ok(n) => {
                    debug!(bytes = n, "Read chunk");
                    if !inbound.send(InboundMessage::from(&buf[..n])).await {
                        break ReadEnd::Stopped;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Read failed, treating as lost connection");
                    break ReadEnd::Failed(e);
                }
            },
        }
    };

    (reader, end)
}

// ─────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct WriteStats {
    sent: u64,
    failed: u64,
}

/// Write one payload. Errors go back to the caller only; the session
/// does not treat them as link loss.
pub async fn write_payload<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

async fn write_loop<C, S>(
    mut writer: WriteHalf<C>,
    mut source: S,
    period: Duration,
    mut closing: watch::Receiver<bool>,
) -> (WriteHalf<C>, WriteStats)
where
    C: AsyncWrite,
    S: MessageSource,
{
    let mut stats = WriteStats::default();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = closing.changed() => break,
            _ = ticker.tick() => {
                // A write stuck on a full socket must not hold up teardown
                tokio::select! {
                    biased;
                    _ = closing.changed() => break,
                    _ = send_tick(&mut writer, &mut source, &mut stats) => {}
                }
            }
        }
    }

    debug!(sent = stats.sent, failed = stats.failed, "Writer stopped");
    (writer, stats)
}

async fn send_tick<W, S>(writer: &mut W, source: &mut S, stats: &mut WriteStats)
where
    W: AsyncWrite + Unpin,
    S: MessageSource,
{
    let payload = match source.produce().await {
        Ok(Some(payload)) => payload,
        Ok(None) => return,
        Err(e) => {
            warn!(source = source.name(), error = %e, "Message source failed");
            return;
        }
    };

    match write_payload(writer, &payload).await {
        Ok(()) => {
            stats.sent += 1;
            debug!(bytes = payload.len(), "Sent payload");
        }
        Err(e) => {
            stats.failed += 1;
            warn!(error = %e, "Write failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
