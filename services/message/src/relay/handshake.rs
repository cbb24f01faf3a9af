//! Connection handshake: the first line of a stream is the bearer token.

use std::time::Duration;

use squeak_common::ApiError;
use squeak_token::{TokenError, Verifier};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::frame::{self, ServerFrame};

/// Longest token line accepted.
const MAX_TOKEN_LINE: u64 = 8 * 1024;

/// Why a handshake failed.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// No complete line arrived in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The stream ended before a token was sent.
    #[error("stream closed before handshake")]
    Closed,

    /// Reading the token failed.
    #[error("handshake read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The token was not accepted.
    #[error("handshake token rejected: {0}")]
    Rejected(#[from] TokenError),
}

/// Read and verify the bearer token on the first line of `stream`.
///
/// On failure an `UNAUTHORIZED` error frame is written (best effort) and
/// the caller should drop the stream.
///
/// # Errors
///
/// Returns a [`HandshakeError`] for a timeout, early close, read failure or
/// rejected token.
pub async fn authenticate<S>(
    stream: &mut S,
    verifier: &Verifier,
    timeout: Duration,
) -> Result<String, HandshakeError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let result = read_subject(stream, verifier, timeout).await;
    if let Err(e) = &result {
        let response = ApiError::Unauthorized.to_response();
        warn!(correlation_id = %response.correlation_id, error = %e, "Relay handshake failed");
        if let Ok(bytes) = frame::encode(&ServerFrame::from(response)) {
            let _ = tokio::time::timeout(timeout, async {
                stream.write_all(&bytes).await?;
                stream.shutdown().await
            })
            .await;
        }
    }
    result
}

async fn read_subject<S>(
    stream: &mut S,
    verifier: &Verifier,
    timeout: Duration,
) -> Result<String, HandshakeError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = tokio::time::timeout(
        timeout,
        (&mut *stream).take(MAX_TOKEN_LINE).read_line(&mut line),
    )
    .await
    .map_err(|_| HandshakeError::Timeout(timeout))??;

    if read == 0 {
        return Err(HandshakeError::Closed);
    }
    let token = verifier.verify_wire(line.trim())?;
    Ok(token.subject().to_string())
}
