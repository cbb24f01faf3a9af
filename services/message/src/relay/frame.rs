//! Line-delimited JSON frames spoken on relay connections.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mailbox::{Envelope, Outgoing};
use squeak_common::ErrorResponse;

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Route a message
    Send(Outgoing),
    /// Liveness probe
    Ping,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A routed message
    Deliver(Envelope),
    /// Reply to `ping`
    Pong,
    /// Fatal condition; the server closes the stream after sending it
    Error {
        /// Stable error code
        code: String,
        /// Sanitized description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Matches the server-side log entry for this failure
        #[serde(
            default,
            rename = "correlationId",
            skip_serializing_if = "Option::is_none"
        )]
        correlation_id: Option<String>,
    },
}

impl ServerFrame {
    /// Bare error frame with `code`.
    #[must_use]
    pub fn error(code: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: None,
            correlation_id: None,
        }
    }
}

impl From<ErrorResponse> for ServerFrame {
    fn from(response: ErrorResponse) -> Self {
        Self::Error {
            code: response.code.as_str().to_string(),
            message: Some(response.message),
            correlation_id: Some(response.correlation_id.to_string()),
        }
    }
}

/// A line that is not a valid frame.
#[derive(Error, Debug)]
#[error("undecodable frame: {0}")]
pub struct FrameError(#[from] serde_json::Error);

/// Decode one line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns [`FrameError`] for anything that is not a client frame.
pub fn decode(line: &str) -> Result<Option<ClientFrame>, FrameError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Encode a frame as one newline-terminated line.
///
/// # Errors
///
/// Returns [`FrameError`] if serialization fails.
pub fn encode(frame: &ServerFrame) -> Result<Vec<u8>, FrameError> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use squeak_common::ApiError;

    #[test]
    fn test_decode_send_and_ping() {
        let frame = decode(r#"{"type":"send","recipient":"bob","payload":"AAE=","keyId":"k1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Send(Outgoing {
                recipient: "bob".to_string(),
                payload: "AAE=".to_string(),
                key_id: "k1".to_string(),
            })
        );
        assert_eq!(decode(r#"{"type":"ping"}"#).unwrap(), Some(ClientFrame::Ping));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        assert!(decode("").unwrap().is_none());
        assert!(decode("  \r").unwrap().is_none());
    }

    #[test]
    fn test_undecodable_lines() {
        assert!(decode("hello").is_err());
        assert!(decode(r#"{"type":"send","recipient":"bob"}"#).is_err());
        assert!(decode(r#"{"type":"shout"}"#).is_err());
        assert!(decode(r#"{"recipient":"bob","payload":"x","keyId":"k"}"#).is_err());
    }

    #[test]
    fn test_encode_deliver() {
        let frame = ServerFrame::Deliver(Envelope {
            recipient: "bob".to_string(),
            payload: "AAE=".to_string(),
            key_id: "k1".to_string(),
            sender: "alice".to_string(),
        });
        let line = String::from_utf8(encode(&frame).unwrap()).unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "deliver");
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["keyId"], "k1");
    }

    #[test]
    fn test_encode_error_and_pong() {
        let line = encode(&ServerFrame::error("SESSION_REPLACED")).unwrap();
        assert_eq!(line, b"{\"type\":\"error\",\"code\":\"SESSION_REPLACED\"}\n");
        assert_eq!(encode(&ServerFrame::Pong).unwrap(), b"{\"type\":\"pong\"}\n");
    }

    #[test]
    fn test_error_frame_from_response() {
        let response = ApiError::Internal("redis at 10.0.0.3 refused".to_string()).to_response();
        let correlation_id = response.correlation_id.to_string();

        let line = String::from_utf8(encode(&ServerFrame::from(response)).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "INTERNAL_ERROR");
        assert_eq!(value["message"], "Internal error");
        assert_eq!(value["correlationId"], correlation_id.as_str());
        assert!(!line.contains("10.0.0.3"));
    }
}
