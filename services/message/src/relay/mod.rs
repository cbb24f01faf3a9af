//! Real-time relay.
//!
//! Each connection runs a reader loop on its own task and a writer task
//! draining a bounded outbound queue. Messages for connected recipients go
//! onto that queue; everything else falls back to the mailbox.

pub mod frame;
pub mod handshake;
pub mod registry;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use self::frame::{ClientFrame, ServerFrame};
use self::registry::{ConnectionId, Registry};
use crate::mailbox::{Envelope, MailboxStore};
use crate::metrics::{CONNECTIONS_ACTIVE, MESSAGES_ROUTED};
use squeak_common::{ApiError, with_deadline};

/// Relay tuning.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Outbound queue capacity per connection
    pub outbound_buffer: usize,
    /// Longest inbound frame, newline excluded
    pub max_frame_bytes: usize,
    /// Upper bound on one write to a client
    pub write_timeout: Duration,
    /// Upper bound on one mailbox write
    pub store_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
            max_frame_bytes: 64 * 1024,
            write_timeout: Duration::from_millis(5_000),
            store_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Where a routed message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued on the recipient's live connection
    Live,
    /// Persisted to the recipient's mailbox
    Stored,
    /// Neither; the mailbox write failed
    Dropped,
}

impl RouteOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Stored => "stored",
            Self::Dropped => "dropped",
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client closed its side
    Closed,
    /// Reading from the stream failed
    ReadError,
    /// The client sent an undecodable or oversized line
    ProtocolError,
    /// A newer connection for the same subject took over
    Replaced,
    /// A write to the client failed or timed out
    WriteFailed,
}

/// Connection registry plus mailbox fallback.
#[derive(Debug)]
pub struct Relay {
    registry: Registry,
    mailbox: Arc<dyn MailboxStore>,
    settings: RelaySettings,
}

impl Relay {
    /// Create a relay over `mailbox`.
    #[must_use]
    pub fn new(mailbox: Arc<dyn MailboxStore>, settings: RelaySettings) -> Self {
        Self {
            registry: Registry::new(),
            mailbox,
            settings,
        }
    }

    /// Live connection registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver live if the recipient is connected, otherwise persist.
    ///
    /// A mailbox failure is logged and the message dropped; it is not
    /// retried.
    pub async fn route(&self, envelope: Envelope) -> RouteOutcome {
        let outcome = match self.registry.try_deliver(envelope) {
            Ok(()) => RouteOutcome::Live,
            Err(envelope) => self.store(envelope).await,
        };
        MESSAGES_ROUTED.with_label_values(&[outcome.as_str()]).inc();
        outcome
    }

    async fn store(&self, envelope: Envelope) -> RouteOutcome {
        let recipient = envelope.recipient.clone();
        let sender = envelope.sender.clone();
        match with_deadline(
            self.settings.store_timeout,
            self.mailbox.append(&recipient, envelope),
        )
        .await
        {
            Ok(()) => RouteOutcome::Stored,
            Err(e) => {
                error!(recipient = %recipient, sender = %sender, error = %e, "Mailbox fallback failed, message dropped");
                RouteOutcome::Dropped
            }
        }
    }

    /// Serve an authenticated connection until it ends.
    ///
    /// Registers `subject`, routes every inbound `send` with the sender set
    /// to `subject`, and deregisters on exit whatever the cause, including
    /// the future being dropped or its task aborted.
    pub async fn handle_connection<S>(&self, subject: &str, stream: S) -> Disconnect
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, queue) = mpsc::channel(self.settings.outbound_buffer.max(1));
        let (evict, mut evicted) = oneshot::channel();

        let mut writer_task = spawn_writer(writer, queue, self.settings.write_timeout);
        let id = self.registry.register(subject, outbound.clone(), evict);
        let _registration =
            Registration::new(&self.registry, subject, id, writer_task.abort_handle());
        info!(subject = %subject, "Relay connection registered");

        let max_frame = self.settings.max_frame_bytes.max(1);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut writer_done = false;
        let reason = loop {
            tokio::select! {
                _ = &mut evicted => {
                    let _ = outbound.try_send(ServerFrame::error("SESSION_REPLACED"));
                    break Disconnect::Replaced;
                }
                _ = &mut writer_task => {
                    writer_done = true;
                    break Disconnect::WriteFailed;
                }
                read = read_frame_line(&mut reader, &mut buf, max_frame) => match read {
                    Ok(0) => break Disconnect::Closed,
                    Ok(_) if buf.ends_with(b"\n") => {
                        let decoded = std::str::from_utf8(&buf)
                            .map_err(|e| e.to_string())
                            .and_then(|line| frame::decode(line).map_err(|e| e.to_string()));
                        buf.clear();
                        match decoded {
                            Ok(None) => {}
                            Ok(Some(ClientFrame::Send(message))) => {
                                self.route(Envelope::from_sender(subject, message)).await;
                            }
                            Ok(Some(ClientFrame::Ping)) => {
                                if outbound.send(ServerFrame::Pong).await.is_err() {
                                    break Disconnect::WriteFailed;
                                }
                            }
                            Err(e) => {
                                break reject_frame(subject, &outbound, "undecodable frame", &e);
                            }
                        }
                    }
                    Ok(_) if buf.len() > max_frame => {
                        let detail = format!("line exceeds {max_frame} bytes");
                        break reject_frame(subject, &outbound, "frame too large", &detail);
                    }
                    // Partial line at end of stream; the next read reports EOF.
                    Ok(_) => {}
                    Err(e) => {
                        debug!(subject = %subject, error = %e, "Relay read failed");
                        break Disconnect::ReadError;
                    }
                },
            }
        };

        self.registry.deregister(subject, id);
        drop(outbound);

        // With every sender gone the writer drains what is queued, then
        // shuts the stream down.
        if !writer_done {
            let _ = writer_task.await;
        }
        info!(subject = %subject, reason = ?reason, "Relay connection closed");
        reason
    }
}

/// Live registration of one connection.
///
/// Dropping it deregisters the connection and stops its writer, so a
/// connection task that is cancelled mid-loop leaves nothing behind.
struct Registration<'a> {
    registry: &'a Registry,
    subject: &'a str,
    id: ConnectionId,
    writer: AbortHandle,
}

impl<'a> Registration<'a> {
    fn new(
        registry: &'a Registry,
        subject: &'a str,
        id: ConnectionId,
        writer: AbortHandle,
    ) -> Self {
        CONNECTIONS_ACTIVE.inc();
        Self {
            registry,
            subject,
            id,
            writer,
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        // No-op when the connection already deregistered or was replaced.
        self.registry.deregister(self.subject, self.id);
        CONNECTIONS_ACTIVE.dec();
        self.writer.abort();
    }
}

/// Read up to one newline into `buf`, never holding more than
/// `max_frame + 1` bytes.
///
/// Cancel safe: bytes read before cancellation stay in `buf`.
async fn read_frame_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_frame: usize,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let room = max_frame.saturating_add(1).saturating_sub(buf.len());
    let room = u64::try_from(room).unwrap_or(u64::MAX);
    (&mut *reader).take(room).read_until(b'\n', buf).await
}

fn reject_frame(
    subject: &str,
    outbound: &mpsc::Sender<ServerFrame>,
    reason: &str,
    detail: &str,
) -> Disconnect {
    let response = ApiError::bad_request(reason).to_response();
    warn!(
        subject = %subject,
        correlation_id = %response.correlation_id,
        error = %detail,
        "Closing connection on bad frame"
    );
    let _ = outbound.try_send(ServerFrame::from(response));
    Disconnect::ProtocolError
}

fn spawn_writer<W>(
    mut writer: W,
    mut queue: mpsc::Receiver<ServerFrame>,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            let bytes = match frame::encode(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            match tokio::time::timeout(write_timeout, writer.write_all(&bytes)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(error = %e, "Relay write failed");
                    return;
                }
                Err(_) => {
                    warn!(timeout = ?write_timeout, "Relay write timed out");
                    return;
                }
            }
        }
        let _ = tokio::time::timeout(write_timeout, writer.shutdown()).await;
    })
}
