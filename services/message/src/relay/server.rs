//! TCP accept loop for the relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use squeak_token::Verifier;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::Relay;
use super::handshake::{self, HandshakeError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop tuning.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Upper bound on receiving the token line
    pub handshake_timeout: Duration,
    /// How long open connections may run after shutdown is requested
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Accept connections on `listener` until `shutdown` completes.
///
/// Each connection is authenticated and then served on its own task. After
/// shutdown no new connections are accepted; open ones get
/// `shutdown_timeout` to finish and are then aborted.
///
/// Accept errors are logged and retried after a short pause.
pub async fn serve<F>(
    listener: TcpListener,
    relay: Arc<Relay>,
    verifier: Arc<Verifier>,
    settings: ServerSettings,
    shutdown: F,
)
where
    F: Future<Output = ()>,
{
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);
    info!(addr = ?listener.local_addr().ok(), "Relay accepting connections");

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                connections.spawn(serve_one(
                    stream,
                    peer,
                    Arc::clone(&relay),
                    Arc::clone(&verifier),
                    settings.handshake_timeout,
                ));
            }
        }
    }

    info!(open = connections.len(), "Relay shutting down");
    let drained = tokio::time::timeout(settings.shutdown_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(open = connections.len(), "Shutdown timeout reached, aborting connections");
        connections.shutdown().await;
    }
}

async fn serve_one(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<Relay>,
    verifier: Arc<Verifier>,
    handshake_timeout: Duration,
) {
    let _ = stream.set_nodelay(true);
    let mut stream = BufReader::new(stream);
    match handshake::authenticate(&mut stream, &verifier, handshake_timeout).await {
        Ok(subject) => {
            relay.handle_connection(&subject, stream).await;
        }
        Err(HandshakeError::Rejected(e)) => {
            info!(peer = %peer, reason = e.reason(), "Relay handshake rejected");
        }
        Err(e) => debug!(peer = %peer, error = %e, "Relay handshake failed"),
    }
}
