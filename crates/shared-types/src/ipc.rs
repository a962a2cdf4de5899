//! # Frame Handshake Messages
//!
//! Messages posted between a parent document and its iframes to negotiate
//! frame ids. Window messaging is reachable by any page script, so every
//! message is prefixed with the extension's secret token and anything without
//! it is rejected before parsing.
//!
//! ```text
//! <token>|{"kind":"frame-id/init"}
//! <token>|{"kind":"frame-id/request","requestID":"..."}
//! <token>|{"kind":"frame-id/result","requestID":"...","payload":3}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{FrameId, RequestId};

/// Separates the secret token from the JSON body.
pub const TOKEN_SEPARATOR: char = '|';

/// Handshake message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FrameMessage {
    /// iframe -> parent, on load.
    #[serde(rename = "frame-id/init")]
    Init,
    /// parent -> iframe.
    #[serde(rename = "frame-id/request")]
    Request {
        #[serde(rename = "requestID")]
        request_id: RequestId,
    },
    /// iframe -> parent, once the iframe knows its own frame id.
    #[serde(rename = "frame-id/result")]
    Result {
        #[serde(rename = "requestID")]
        request_id: RequestId,
        payload: FrameId,
    },
}

/// Why a posted window message was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameMessageError {
    /// Missing or wrong secret token: posted by something other than the extension.
    #[error("Foreign sender: message lacks the extension token")]
    ForeignSender,

    /// Token matched but the body is not a known handshake message.
    #[error("Malformed frame message: {0}")]
    Malformed(String),
}

impl FrameMessage {
    /// Prefix with `token` and serialize for `postMessage`.
    #[must_use]
    pub fn encode(&self, token: &str) -> String {
        // Serializing a fieldless-or-plain-field enum cannot fail.
        let body = serde_json::to_string(self).unwrap_or_default();
        format!("{token}{TOKEN_SEPARATOR}{body}")
    }

    /// Check the token, then parse the body.
    ///
    /// # Errors
    ///
    /// - `ForeignSender` when the token prefix is absent or different
    /// - `Malformed` when the body is not JSON or carries an unknown `kind`
    pub fn decode(token: &str, raw: &str) -> Result<Self, FrameMessageError> {
        let Some((prefix, body)) = raw.split_once(TOKEN_SEPARATOR) else {
            return Err(FrameMessageError::ForeignSender);
        };
        if token.is_empty() || prefix != token {
            return Err(FrameMessageError::ForeignSender);
        }
        serde_json::from_str(body).map_err(|e| FrameMessageError::Malformed(e.to_string()))
    }
}
